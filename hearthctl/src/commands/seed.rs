//! Seed command. Fixtures go through the same store operations the
//! service uses, so seeded data obeys every lifecycle rule: tenancies
//! are created by approving a join request, payments by recording them
//! against the tenancy.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use hearth_store::{NewJoinRequest, NewManualPayment, NewProfile, RowScope, Store};
use letting::{PaymentMethod, Profile, Property, Role, TenancyStatus, Unit, Verdict};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Path to the SQLite database (created if missing)
    #[arg(long, env = "HEARTH_DB")]
    pub db: PathBuf,

    /// YAML fixture file
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    #[serde(default)]
    landlords: Vec<LandlordFixture>,
    #[serde(default)]
    tenants: Vec<PersonFixture>,
    #[serde(default)]
    tenancies: Vec<TenancyFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LandlordFixture {
    email: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default = "default_password")]
    password: String,
    #[serde(default)]
    properties: Vec<PropertyFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonFixture {
    email: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default = "default_password")]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyFixture {
    name: String,
    address: String,
    #[serde(default)]
    units: Vec<UnitFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitFixture {
    label: String,
    rent: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TenancyFixture {
    property: String,
    unit: String,
    /// Tenant email.
    tenant: String,
    #[serde(default)]
    payments: Vec<PaymentFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaymentFixture {
    amount: i64,
    method: String,
    paid_on: NaiveDate,
}

fn default_password() -> String {
    "changeme".to_string()
}

pub fn run(args: SeedArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading fixture {}", args.fixture.display()))?;
    let fixture: Fixture = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing fixture {}", args.fixture.display()))?;
    let store = hearth_store::Store::open(&args.db)
        .with_context(|| format!("opening database at {}", args.db.display()))?;

    let pepper = std::env::var("HEARTH_PEPPER").ok();
    let mut seeded = SeedCounts::default();

    for landlord in &fixture.landlords {
        let seed = ProfileSeed {
            email: &landlord.email,
            name: &landlord.name,
            phone: landlord.phone.as_deref(),
            password: &landlord.password,
            role: Role::Landlord,
        };
        let profile = ensure_profile(&store, seed, pepper.as_deref(), &mut seeded)?;
        for property in &landlord.properties {
            let row = ensure_property(&store, &profile, property, &mut seeded)?;
            for unit in &property.units {
                ensure_unit(&store, &profile, &row, unit, &mut seeded)?;
            }
        }
    }

    for tenant in &fixture.tenants {
        let seed = ProfileSeed {
            email: &tenant.email,
            name: &tenant.name,
            phone: tenant.phone.as_deref(),
            password: &tenant.password,
            role: Role::Tenant,
        };
        ensure_profile(&store, seed, pepper.as_deref(), &mut seeded)?;
    }

    for tenancy in &fixture.tenancies {
        ensure_tenancy(&store, tenancy, &mut seeded)?;
    }

    println!(
        "✓ Seeded {} profiles, {} properties, {} units, {} tenancies, {} payments",
        seeded.profiles, seeded.properties, seeded.units, seeded.tenancies, seeded.payments
    );
    Ok(())
}

#[derive(Debug, Default)]
struct SeedCounts {
    profiles: u64,
    properties: u64,
    units: u64,
    tenancies: u64,
    payments: u64,
}

struct ProfileSeed<'a> {
    email: &'a str,
    name: &'a str,
    phone: Option<&'a str>,
    password: &'a str,
    role: Role,
}

fn ensure_profile(
    store: &Store,
    seed: ProfileSeed<'_>,
    pepper: Option<&str>,
    seeded: &mut SeedCounts,
) -> Result<Profile> {
    if let Some(existing) = store.profile_by_email(seed.email)? {
        if existing.role != seed.role {
            bail!(
                "fixture lists {} as {} but the database has them as {}",
                seed.email,
                seed.role,
                existing.role
            );
        }
        return Ok(existing);
    }
    let password_hash = hearth_web::auth::hash_password(seed.password, pepper)?;
    let profile = store.create_profile(NewProfile {
        email: seed.email.to_string(),
        password_hash,
        display_name: seed.name.to_string(),
        phone: seed.phone.map(str::to_string),
        role: seed.role,
    })?;
    seeded.profiles += 1;
    tracing::info!(email = seed.email, role = %seed.role, "seeded profile");
    Ok(profile)
}

fn ensure_property(
    store: &Store,
    landlord: &Profile,
    fixture: &PropertyFixture,
    seeded: &mut SeedCounts,
) -> Result<Property> {
    let scope = RowScope::Landlord(landlord.id);
    if let Some(existing) = store
        .list_properties(&scope)?
        .into_iter()
        .find(|p| p.name == fixture.name)
    {
        return Ok(existing);
    }
    let property = store.create_property(landlord.id, &fixture.name, &fixture.address)?;
    seeded.properties += 1;
    Ok(property)
}

fn ensure_unit(
    store: &Store,
    landlord: &Profile,
    property: &Property,
    fixture: &UnitFixture,
    seeded: &mut SeedCounts,
) -> Result<Unit> {
    let scope = RowScope::Landlord(landlord.id);
    if let Some(existing) = store
        .list_units(&scope, property.id)?
        .into_iter()
        .find(|u| u.label == fixture.label)
    {
        return Ok(existing);
    }
    let unit = store.create_unit(landlord.id, property.id, &fixture.label, fixture.rent)?;
    seeded.units += 1;
    Ok(unit)
}

fn ensure_tenancy(store: &Store, fixture: &TenancyFixture, seeded: &mut SeedCounts) -> Result<()> {
    let tenant = store
        .profile_by_email(&fixture.tenant)?
        .ok_or_else(|| anyhow!("tenancy references unknown tenant {}", fixture.tenant))?;
    let property = store
        .list_properties(&RowScope::All)?
        .into_iter()
        .find(|p| p.name == fixture.property)
        .ok_or_else(|| anyhow!("tenancy references unknown property {}", fixture.property))?;
    let unit = store
        .list_units(&RowScope::Landlord(property.landlord_id), property.id)?
        .into_iter()
        .find(|u| u.label == fixture.unit)
        .ok_or_else(|| {
            anyhow!(
                "tenancy references unknown unit {} in {}",
                fixture.unit,
                fixture.property
            )
        })?;

    let tenancy = match store
        .list_tenancies(&RowScope::Tenant(tenant.id))?
        .into_iter()
        .find(|t| t.unit_id == unit.id && t.status == TenancyStatus::Active)
    {
        Some(existing) => existing,
        None => {
            let request = store.file_join_request(NewJoinRequest {
                tenant_id: tenant.id,
                unit_id: unit.id,
                message: None,
            })?;
            store.decide_join_request(
                property.landlord_id,
                request.id,
                Verdict::Approve,
                Some("seeded"),
            )?;
            let tenancy = store
                .list_tenancies(&RowScope::Tenant(tenant.id))?
                .into_iter()
                .find(|t| t.unit_id == unit.id && t.status == TenancyStatus::Active)
                .ok_or_else(|| anyhow!("approval did not produce a tenancy"))?;
            seeded.tenancies += 1;
            tracing::info!(tenant = %tenant.email, unit = %unit.label, "seeded tenancy");
            tenancy
        }
    };

    let existing = store.payments_for_tenancy(&RowScope::Tenant(tenant.id), tenancy.id)?;
    for payment in &fixture.payments {
        let method: PaymentMethod = payment
            .method
            .parse()
            .map_err(|e: letting::UnknownVariant| anyhow!(e))?;
        if method == PaymentMethod::Momo {
            bail!("fixtures cannot seed momo payments; they are gateway-initiated");
        }
        let already = existing.iter().any(|p| {
            p.amount == payment.amount && p.paid_on == payment.paid_on && p.method == method
        });
        if already {
            continue;
        }
        store.record_payment(
            property.landlord_id,
            NewManualPayment {
                tenancy_id: tenancy.id,
                amount: payment.amount,
                method,
                paid_on: payment.paid_on,
            },
        )?;
        seeded.payments += 1;
    }
    Ok(())
}
