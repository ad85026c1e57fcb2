use anyhow::Result;
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio::task;

async fn start_app() -> Result<(String, TempDir)> {
    let dir = TempDir::new()?;
    let mut settings = settings::Settings::default();
    settings.auth.jwt_secret = "integration-secret-integration-secret".to_string();
    let store = hearth_store::Store::open(dir.path().join("hearth.db"))?;
    let state = hearth_web::AppState::new(&settings, store)?;
    let app = hearth_web::create_app(state);
    // Bind ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let port = listener.local_addr()?.port();
    task::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Ok((format!("http://127.0.0.1:{}", port), dir))
}

async fn register(
    http: &reqwest::Client,
    base: &str,
    email: &str,
    role: &str,
) -> Result<String> {
    let r = http
        .post(format!("{}/api/auth/register", base))
        .header("X-Requested-With", "fetch")
        .json(&serde_json::json!({
            "email": email,
            "password": "hunter2hunter2",
            "displayName": email.split('@').next().unwrap(),
            "role": role
        }))
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let body: serde_json::Value = r.json().await?;
    Ok(body["token"].as_str().unwrap().to_string())
}

async fn post_json(
    http: &reqwest::Client,
    url: String,
    token: &str,
    body: serde_json::Value,
) -> Result<reqwest::Response> {
    Ok(http
        .post(url)
        .header("X-Requested-With", "fetch")
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?)
}

#[tokio::test]
async fn full_letting_flow_from_listing_to_rent() -> Result<()> {
    let (base, _dir) = start_app().await?;
    let http = reqwest::Client::new();
    let landlord = register(&http, &base, "amara@example.com", "landlord").await?;
    let tenant = register(&http, &base, "kato@example.com", "tenant").await?;

    // Landlord sets up a property with two units
    let r = post_json(
        &http,
        format!("{}/api/properties", base),
        &landlord,
        serde_json::json!({"name": "Kira Heights", "address": "Plot 12, Kira Road"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let property: serde_json::Value = r.json().await?;
    let property_id = property["id"].as_str().unwrap().to_string();

    let r = post_json(
        &http,
        format!("{}/api/properties/{}/units", base, property_id),
        &landlord,
        serde_json::json!({"label": "A1", "rentAmount": 500_000}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let unit_a1: serde_json::Value = r.json().await?;
    let unit_a1_id = unit_a1["id"].as_str().unwrap().to_string();

    let r = post_json(
        &http,
        format!("{}/api/properties/{}/units", base, property_id),
        &landlord,
        serde_json::json!({"label": "A2", "rentAmount": 750_000}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);

    // Both units show up on the tenant's browse page
    let r = http
        .get(format!("{}/api/units/vacant", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let listings: serde_json::Value = r.json().await?;
    assert_eq!(listings.as_array().unwrap().len(), 2);
    assert_eq!(listings[0]["propertyName"], "Kira Heights");

    // Rent filters narrow the listing
    let r = http
        .get(format!("{}/api/units/vacant?maxRent=600000", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    let filtered: serde_json::Value = r.json().await?;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["label"], "A1");

    // Tenant applies for A1
    let r = post_json(
        &http,
        format!("{}/api/units/{}/join-requests", base, unit_a1_id),
        &tenant,
        serde_json::json!({"message": "I work nearby"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let request: serde_json::Value = r.json().await?;
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_str().unwrap().to_string();

    // Landlord sees it in the pending queue
    let r = http
        .get(format!("{}/api/join-requests?status=pending", base))
        .bearer_auth(&landlord)
        .send()
        .await?;
    let pending: serde_json::Value = r.json().await?;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // First approval applies
    let r = post_json(
        &http,
        format!("{}/api/join-requests/{}/approve", base, request_id),
        &landlord,
        serde_json::json!({"note": "welcome"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let body: serde_json::Value = r.json().await?;
    assert_eq!(body["status"], "applied");
    assert_eq!(body["request"]["status"], "approved");

    // Duplicate approve -> 200 noop
    let r = post_json(
        &http,
        format!("{}/api/join-requests/{}/approve", base, request_id),
        &landlord,
        serde_json::json!({}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let body: serde_json::Value = r.json().await?;
    assert_eq!(body["status"], "noop");

    // Conflicting reject -> 409 reporting the recorded decision
    let r = post_json(
        &http,
        format!("{}/api/join-requests/{}/reject", base, request_id),
        &landlord,
        serde_json::json!({"note": "oops"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = r.json().await?;
    assert_eq!(body["status"], "approved");

    // Approval created an active tenancy at the advertised rent
    let r = http
        .get(format!("{}/api/tenancies", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    let tenancies: serde_json::Value = r.json().await?;
    assert_eq!(tenancies.as_array().unwrap().len(), 1);
    let tenancy = &tenancies[0];
    assert_eq!(tenancy["status"], "active");
    assert_eq!(tenancy["rentAmount"], 500_000);
    let tenancy_id = tenancy["id"].as_str().unwrap().to_string();

    // The occupied unit left the browse listing
    let r = http
        .get(format!("{}/api/units/vacant", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    let listings: serde_json::Value = r.json().await?;
    assert_eq!(listings.as_array().unwrap().len(), 1);
    assert_eq!(listings[0]["label"], "A2");

    // A competitor's request for the now-occupied unit cannot be approved
    let rival = register(&http, &base, "rival@example.com", "tenant").await?;
    let r = post_json(
        &http,
        format!("{}/api/units/{}/join-requests", base, unit_a1_id),
        &rival,
        serde_json::json!({}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let rival_request: serde_json::Value = r.json().await?;
    let r = post_json(
        &http,
        format!(
            "{}/api/join-requests/{}/approve",
            base,
            rival_request["id"].as_str().unwrap()
        ),
        &landlord,
        serde_json::json!({}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CONFLICT);

    // Tenant reports a leak
    let r = post_json(
        &http,
        format!("{}/api/units/{}/maintenance", base, unit_a1_id),
        &tenant,
        serde_json::json!({"summary": "Kitchen tap leaks", "detail": "Drips overnight"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let issue: serde_json::Value = r.json().await?;
    assert_eq!(issue["status"], "open");
    let issue_id = issue["id"].as_str().unwrap().to_string();

    // Landlord walks it forward; going backwards conflicts
    let r = post_json(
        &http,
        format!("{}/api/maintenance/{}/status", base, issue_id),
        &landlord,
        serde_json::json!({"status": "in_progress"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let issue: serde_json::Value = r.json().await?;
    assert_eq!(issue["status"], "in_progress");

    let r = post_json(
        &http,
        format!("{}/api/maintenance/{}/status", base, issue_id),
        &landlord,
        serde_json::json!({"status": "open"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CONFLICT);

    let r = post_json(
        &http,
        format!("{}/api/maintenance/{}/status", base, issue_id),
        &landlord,
        serde_json::json!({"status": "resolved"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);

    // Landlord records this month's rent in cash
    let r = post_json(
        &http,
        format!("{}/api/tenancies/{}/payments", base, tenancy_id),
        &landlord,
        serde_json::json!({"amount": 500_000, "method": "cash"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CREATED);
    let payment: serde_json::Value = r.json().await?;
    assert_eq!(payment["status"], "confirmed");
    let payment_id = payment["id"].as_str().unwrap().to_string();

    // Momo rows are gateway-initiated, never hand-recorded
    let r = post_json(
        &http,
        format!("{}/api/tenancies/{}/payments", base, tenancy_id),
        &landlord,
        serde_json::json!({"amount": 500_000, "method": "momo"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::BAD_REQUEST);

    // A confirmed payment cannot be settled again
    let r = post_json(
        &http,
        format!("{}/api/payments/{}/settle", base, payment_id),
        &landlord,
        serde_json::json!({"outcome": "confirmed"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CONFLICT);

    // The tenant sees the payment too
    let r = http
        .get(format!("{}/api/tenancies/{}/payments", base, tenancy_id))
        .bearer_auth(&tenant)
        .send()
        .await?;
    let payments: serde_json::Value = r.json().await?;
    assert_eq!(payments.as_array().unwrap().len(), 1);

    // Portfolio numbers line up for the current month
    let r = http
        .get(format!("{}/api/stats/portfolio", base))
        .bearer_auth(&landlord)
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let stats: serde_json::Value = r.json().await?;
    assert_eq!(stats["properties"], 1);
    assert_eq!(stats["units"], 2);
    assert_eq!(stats["occupiedUnits"], 1);
    assert_eq!(stats["vacantUnits"], 1);
    assert_eq!(stats["activeTenancies"], 1);
    assert_eq!(stats["expectedRent"], 500_000);
    assert_eq!(stats["collected"], 500_000);
    assert_eq!(stats["outstanding"], 0);

    // Platform rollup is admin-only
    let r = http
        .get(format!("{}/api/stats/platform", base))
        .bearer_auth(&landlord)
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn foreign_rows_stay_invisible() -> Result<()> {
    let (base, _dir) = start_app().await?;
    let http = reqwest::Client::new();
    let amara = register(&http, &base, "amara@example.com", "landlord").await?;
    let okello = register(&http, &base, "okello@example.com", "landlord").await?;
    let tenant = register(&http, &base, "kato@example.com", "tenant").await?;

    let r = post_json(
        &http,
        format!("{}/api/properties", base),
        &amara,
        serde_json::json!({"name": "Kira Heights", "address": "Plot 12"}),
    )
    .await?;
    let property: serde_json::Value = r.json().await?;
    let property_id = property["id"].as_str().unwrap().to_string();

    // Another landlord cannot read or edit it; it reads as absent
    let r = http
        .get(format!("{}/api/properties/{}", base, property_id))
        .bearer_auth(&okello)
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::NOT_FOUND);

    let r = http
        .put(format!("{}/api/properties/{}", base, property_id))
        .header("X-Requested-With", "fetch")
        .bearer_auth(&okello)
        .json(&serde_json::json!({"name": "Mine Now"}))
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::NOT_FOUND);

    // Tenants cannot act as landlords at all
    let r = post_json(
        &http,
        format!("{}/api/properties", base),
        &tenant,
        serde_json::json!({"name": "Sneaky", "address": "Nowhere"}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::FORBIDDEN);

    let r = http
        .get(format!("{}/api/stats/portfolio", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    assert_eq!(r.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn ending_a_tenancy_frees_the_unit() -> Result<()> {
    let (base, _dir) = start_app().await?;
    let http = reqwest::Client::new();
    let landlord = register(&http, &base, "amara@example.com", "landlord").await?;
    let tenant = register(&http, &base, "kato@example.com", "tenant").await?;

    let r = post_json(
        &http,
        format!("{}/api/properties", base),
        &landlord,
        serde_json::json!({"name": "Kira Heights", "address": "Plot 12"}),
    )
    .await?;
    let property: serde_json::Value = r.json().await?;
    let r = post_json(
        &http,
        format!(
            "{}/api/properties/{}/units",
            base,
            property["id"].as_str().unwrap()
        ),
        &landlord,
        serde_json::json!({"label": "B4", "rentAmount": 400_000}),
    )
    .await?;
    let unit: serde_json::Value = r.json().await?;
    let unit_id = unit["id"].as_str().unwrap().to_string();

    let r = post_json(
        &http,
        format!("{}/api/units/{}/join-requests", base, unit_id),
        &tenant,
        serde_json::json!({}),
    )
    .await?;
    let request: serde_json::Value = r.json().await?;
    let r = post_json(
        &http,
        format!(
            "{}/api/join-requests/{}/approve",
            base,
            request["id"].as_str().unwrap()
        ),
        &landlord,
        serde_json::json!({}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);

    // Find the tenancy from the landlord's list
    let r = http
        .get(format!("{}/api/tenancies", base))
        .bearer_auth(&landlord)
        .send()
        .await?;
    let tenancies: serde_json::Value = r.json().await?;
    assert_eq!(tenancies[0]["unitId"], unit_id.as_str());
    let tenancy_id = tenancies[0]["id"].as_str().unwrap().to_string();

    // End it with an explicit move-out date
    let today = chrono::Utc::now().date_naive().to_string();
    let r = post_json(
        &http,
        format!("{}/api/tenancies/{}/end", base, tenancy_id),
        &landlord,
        serde_json::json!({"endedOn": today}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::OK);
    let ended: serde_json::Value = r.json().await?;
    assert_eq!(ended["status"], "ended");
    assert_eq!(ended["endedOn"], today.as_str());

    // The unit is back on the market
    let r = http
        .get(format!("{}/api/units/vacant", base))
        .bearer_auth(&tenant)
        .send()
        .await?;
    let listings: serde_json::Value = r.json().await?;
    assert_eq!(listings.as_array().unwrap().len(), 1);
    assert_eq!(listings[0]["label"], "B4");

    // Ending twice conflicts
    let r = post_json(
        &http,
        format!("{}/api/tenancies/{}/end", base, tenancy_id),
        &landlord,
        serde_json::json!({}),
    )
    .await?;
    assert_eq!(r.status(), StatusCode::CONFLICT);
    Ok(())
}
