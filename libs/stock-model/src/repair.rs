//! One-pass schema repairs on a database document
//!
//! Every repair mutates the document in memory and returns a
//! [`RepairReport`]; callers decide whether the result is written.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::assignment::WarehouseAssigner;
use crate::document::{safe_key, DatabaseDocument, Section};
use crate::encoding::repair_value;
use crate::error::Result;
use crate::record::{
    price_value, warehouse_value, ProductView, FIELD_NAME, FIELD_PRICE, FIELD_SKU, FIELD_STOCK,
    FIELD_WAREHOUSE,
};

/// Snake-case fields renamed to the app's camelCase names
pub const FIELD_RENAMES: &[(&str, &str)] = &[("created_at", "createdAt"), ("updated_at", "updatedAt")];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub name: String,
    pub examined: usize,
    pub changed: usize,
    /// Human-readable changes (`old -> new`, created ids, ...)
    pub changes: Vec<String>,
    /// Records the repair refused to touch
    pub conflicts: Vec<String>,
}

impl RepairReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

fn str_field<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn field_or(record: &Map<String, Value>, fields: &[&str], default: Value) -> Value {
    fields
        .iter()
        .find_map(|f| record.get(*f).filter(|v| !v.is_null()).cloned())
        .unwrap_or(default)
}

fn default_settings() -> Value {
    json!({
        "emailNotifications": true,
        "pushNotifications": false,
        "theme": "light",
        "language": "en"
    })
}

/// Create missing `users` entries from `user_profiles` and the reverse
pub fn sync_users(doc: &mut DatabaseDocument) -> Result<RepairReport> {
    let mut report = RepairReport::new("users");

    let users: Map<String, Value> = doc.section(Section::Users).cloned().unwrap_or_default();
    let profiles: Map<String, Value> = doc
        .section(Section::UserProfiles)
        .cloned()
        .unwrap_or_default();
    report.examined = users.len() + profiles.len();

    let mut new_users = Vec::new();
    for (uid, profile) in &profiles {
        if users.contains_key(uid) {
            continue;
        }
        let Some(profile) = profile.as_object() else {
            report.conflicts.push(format!("user_profiles/{} is not an object", uid));
            continue;
        };
        let role = profile
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("user")
            .to_lowercase();
        let user = json!({
            "uid": field_or(profile, &["uid"], Value::String(uid.clone())),
            "email": field_or(profile, &["email"], json!("")),
            "displayName": field_or(profile, &["name", "displayName"], json!("")),
            "createdAt": field_or(profile, &["created_at", "createdAt"], json!(0)),
            "emailVerified": false,
            "role": role,
        });
        new_users.push((uid.clone(), user));
    }

    let mut new_profiles = Vec::new();
    for (uid, user) in &users {
        if profiles.contains_key(uid) {
            continue;
        }
        let Some(user) = user.as_object() else {
            report.conflicts.push(format!("users/{} is not an object", uid));
            continue;
        };
        let display_name = field_or(user, &["displayName"], json!(""));
        let created_at = field_or(user, &["createdAt"], json!(0));
        let profile = json!({
            "uid": uid,
            "email": field_or(user, &["email"], json!("")),
            "displayName": display_name.clone(),
            "name": display_name,
            "role": field_or(user, &["role"], json!("user")),
            "createdAt": created_at.clone(),
            "updatedAt": created_at,
            "company": "",
            "phoneNumber": "",
            "photoURL": "",
            "status": "active",
            "settings": default_settings(),
        });
        new_profiles.push((uid.clone(), profile));
    }

    let users_section = doc.section_mut(Section::Users)?;
    for (uid, user) in new_users {
        report.changes.push(format!("created users/{}", uid));
        users_section.insert(uid, user);
    }
    let profiles_section = doc.section_mut(Section::UserProfiles)?;
    for (uid, profile) in new_profiles {
        report.changes.push(format!("created user_profiles/{}", uid));
        profiles_section.insert(uid, profile);
    }
    report.changed = report.changes.len();
    Ok(report)
}

/// Rename snake_case timestamps everywhere and complete user profiles
pub fn standardize_fields(doc: &mut DatabaseDocument) -> Result<RepairReport> {
    let mut report = RepairReport::new("fields");
    let names: Vec<String> = doc.section_names().map(str::to_string).collect();

    for name in names {
        let Ok(section) = name.parse::<Section>() else {
            continue;
        };
        if section == Section::AppSettings {
            continue;
        }
        let records = doc.section_mut(section)?;
        for (key, record) in records.iter_mut() {
            let Some(record) = record.as_object_mut() else {
                continue;
            };
            report.examined += 1;
            let mut touched = false;

            for (old, new) in FIELD_RENAMES {
                if !record.contains_key(*old) {
                    continue;
                }
                if record.contains_key(*new) {
                    report
                        .conflicts
                        .push(format!("{}/{} has both {} and {}", section, key, old, new));
                    continue;
                }
                if let Some(value) = record.remove(*old) {
                    record.insert((*new).to_string(), value);
                    touched = true;
                }
            }

            if section == Section::UserProfiles {
                touched |= complete_profile(record);
            }
            if touched {
                report.changes.push(format!("{}/{}", section, key));
            }
        }
    }
    report.changed = report.changes.len();
    Ok(report)
}

fn complete_profile(profile: &mut Map<String, Value>) -> bool {
    let mut touched = false;
    let name = str_field(profile, "name").map(str::to_string);
    let display = str_field(profile, "displayName").map(str::to_string);
    match (name, display) {
        (None, Some(display)) => {
            profile.insert("name".into(), Value::String(display));
            touched = true;
        },
        (Some(name), None) => {
            profile.insert("displayName".into(), Value::String(name));
            touched = true;
        },
        _ => {},
    }
    if !profile.contains_key("settings") {
        profile.insert("settings".into(), default_settings());
        touched = true;
    }
    if !profile.contains_key("status") {
        profile.insert("status".into(), json!("active"));
        touched = true;
    }
    touched
}

/// Fill `price`, `sku`, `name` and `stock` on spare parts that lack them
pub fn fill_spare_part_defaults(doc: &mut DatabaseDocument) -> Result<RepairReport> {
    let mut report = RepairReport::new("spare-defaults");
    let parts = doc.section_mut(Section::SpareParts)?;
    for (key, part) in parts.iter_mut() {
        let Some(part) = part.as_object_mut() else {
            continue;
        };
        report.examined += 1;
        let mut filled = Vec::new();
        if !part.contains_key(FIELD_PRICE) {
            part.insert(FIELD_PRICE.into(), json!(0));
            filled.push(FIELD_PRICE);
        }
        if !part.contains_key(FIELD_SKU) {
            part.insert(FIELD_SKU.into(), Value::String(key.clone()));
            filled.push(FIELD_SKU);
        }
        if !part.contains_key(FIELD_NAME) {
            let name = str_field(part, "description").unwrap_or("").to_string();
            part.insert(FIELD_NAME.into(), Value::String(name));
            filled.push(FIELD_NAME);
        }
        if !part.contains_key(FIELD_STOCK) {
            part.insert(FIELD_STOCK.into(), json!(0));
            filled.push(FIELD_STOCK);
        }
        if !filled.is_empty() {
            report
                .changes
                .push(format!("spareparts/{}: {}", key, filled.join(", ")));
        }
    }
    report.changed = report.changes.len();
    Ok(report)
}

/// Set `price` on spare parts, optionally only where it is missing
pub fn set_spare_part_prices(
    doc: &mut DatabaseDocument,
    price: f64,
    only_missing: bool,
) -> Result<RepairReport> {
    let mut report = RepairReport::new("spare-prices");
    let wanted = price_value(price);
    let parts = doc.section_mut(Section::SpareParts)?;
    for (key, part) in parts.iter_mut() {
        let Some(part) = part.as_object_mut() else {
            continue;
        };
        report.examined += 1;
        let has_price = part.get(FIELD_PRICE).is_some_and(|p| !p.is_null());
        if only_missing && has_price {
            continue;
        }
        if part.get(FIELD_PRICE) != Some(&wanted) {
            part.insert(FIELD_PRICE.into(), wanted.clone());
            report.changes.push(format!("spareparts/{}", key));
        }
    }
    report.changed = report.changes.len();
    Ok(report)
}

/// Strip `*` from SKUs and rekey records whose key was the starred SKU
pub fn strip_asterisks(doc: &mut DatabaseDocument) -> Result<RepairReport> {
    let mut report = RepairReport::new("asterisks");
    for section in [Section::Products, Section::SpareParts] {
        if doc.section(section).is_none() {
            continue;
        }
        let records = std::mem::take(doc.section_mut(section)?);
        let original_keys: HashSet<String> = records.keys().cloned().collect();
        let mut rebuilt = Map::new();

        for (key, mut record) in records {
            report.examined += 1;
            if let Some(obj) = record.as_object_mut() {
                if let Some(sku) = str_field(obj, FIELD_SKU).filter(|s| s.contains('*')) {
                    let clean = sku.replace('*', "");
                    report
                        .changes
                        .push(format!("{}/{}: sku {} -> {}", section, key, sku, clean));
                    obj.insert(FIELD_SKU.into(), Value::String(clean));
                }
            }
            if !key.contains('*') {
                rebuilt.insert(key, record);
                continue;
            }
            let new_key = key.replace('*', "");
            if original_keys.contains(&new_key) || rebuilt.contains_key(&new_key) {
                warn!("{}/{} collides with existing {}", section, key, new_key);
                report
                    .conflicts
                    .push(format!("{}/{} -> {} already exists", section, key, new_key));
                rebuilt.insert(key, record);
                continue;
            }
            report
                .changes
                .push(format!("{}: key {} -> {}", section, key, new_key));
            rebuilt.insert(new_key, record);
        }
        doc.replace_section(section, rebuilt);
    }
    report.changed = report.changes.len();
    Ok(report)
}

/// Rekey a section by each record's SKU (`product_0042` -> `TSR-23SD-N`)
///
/// Each SKU key goes to the record already stored under it, else to the
/// first record carrying that SKU. Records left out keep their key; one that
/// sits on a SKU key moves to `<key>_2`. Every record survives.
pub fn rekey_by_sku(doc: &mut DatabaseDocument, section: Section) -> Result<RepairReport> {
    let mut report = RepairReport::new("rekey-sku");
    let records: Vec<(String, Value)> = std::mem::take(doc.section_mut(section)?).into_iter().collect();
    let skus: Vec<Option<String>> = records
        .iter()
        .map(|(_, record)| {
            ProductView::from_record(record)
                .sku
                .as_deref()
                .map(safe_key)
                .filter(|s| !s.is_empty())
        })
        .collect();

    // sku key -> position of the record that takes it
    let mut owners: HashMap<&str, usize> = HashMap::new();
    for (pos, sku) in skus.iter().enumerate() {
        let Some(sku) = sku.as_deref() else {
            continue;
        };
        let keyed_by_sku = records[pos].0 == sku;
        if keyed_by_sku || !owners.contains_key(sku) {
            owners.insert(sku, pos);
        }
    }

    let mut rebuilt = Map::new();
    for (pos, ((key, record), sku)) in records.into_iter().zip(&skus).enumerate() {
        report.examined += 1;
        let new_key = match sku.as_deref() {
            Some(sku) if owners.get(sku) == Some(&pos) => sku.to_string(),
            other => {
                report.conflicts.push(match other {
                    Some(sku) => format!("{}/{} duplicates sku {}, key kept", section, key, sku),
                    None => format!("{}/{} has no sku, key kept", section, key),
                });
                let mut candidate = key.clone();
                let mut suffix = 1;
                while owners.contains_key(candidate.as_str()) || rebuilt.contains_key(&candidate) {
                    suffix += 1;
                    candidate = format!("{}_{}", key, suffix);
                }
                if candidate != key {
                    warn!("{}/{} sits on a sku key, moved to {}", section, key, candidate);
                }
                candidate
            },
        };
        if new_key != key {
            report.changes.push(format!("{} -> {}", key, new_key));
        }
        rebuilt.insert(new_key, record);
    }
    debug!("{} rekeyed to {} records", section, rebuilt.len());
    doc.replace_section(section, rebuilt);
    report.changed = report.changes.len();
    Ok(report)
}

/// Rekey a section to `{prefix}{n:0width}` in document order
pub fn rekey_sequential(
    doc: &mut DatabaseDocument,
    section: Section,
    prefix: &str,
    width: usize,
) -> Result<RepairReport> {
    let mut report = RepairReport::new("rekey-seq");
    let records = std::mem::take(doc.section_mut(section)?);
    let mut rebuilt = Map::new();
    for (n, (key, record)) in records.into_iter().enumerate() {
        report.examined += 1;
        let new_key = format!("{}{:0width$}", prefix, n + 1, width = width);
        if new_key != key {
            report.changes.push(format!("{} -> {}", key, new_key));
        }
        rebuilt.insert(new_key, record);
    }
    doc.replace_section(section, rebuilt);
    report.changed = report.changes.len();
    Ok(report)
}

/// Repair mojibake in product and spare-part text
pub fn fix_encoding(doc: &mut DatabaseDocument) -> Result<RepairReport> {
    let mut report = RepairReport::new("encoding");
    for section in [Section::Products, Section::SpareParts] {
        if doc.section(section).is_none() {
            continue;
        }
        let records = doc.section_mut(section)?;
        for (key, record) in records.iter_mut() {
            report.examined += 1;
            let fixed = repair_value(record);
            if fixed > 0 {
                report
                    .changes
                    .push(format!("{}/{}: {} field(s)", section, key, fixed));
            }
        }
    }
    report.changed = report.changes.len();
    Ok(report)
}

/// Drop records whose SKU (or model, when SKU is empty) starts with `prefix`
pub fn prune_prefix(
    doc: &mut DatabaseDocument,
    section: Section,
    prefix: &str,
) -> Result<RepairReport> {
    let mut report = RepairReport::new("prune");
    let wanted = prefix.trim().to_uppercase();
    if wanted.is_empty() {
        return Ok(report);
    }
    let records = doc.section_mut(section)?;
    report.examined = records.len();
    records.retain(|key, record| {
        let view = ProductView::from_record(record);
        let code = view.sku.or(view.model).unwrap_or_default();
        let doomed = code.trim().to_uppercase().starts_with(&wanted);
        if doomed {
            report.changes.push(format!("{} ({})", key, code));
        }
        !doomed
    });
    report.changed = report.changes.len();
    Ok(report)
}

/// Give a warehouse to stocked records that lack one
///
/// Located `warehouseStock` wins over the policy. With `overwrite` every
/// stocked record is re-placed; zero-stock records always lose their
/// warehouse.
pub fn assign_warehouses(
    doc: &mut DatabaseDocument,
    section: Section,
    assigner: &mut WarehouseAssigner,
    overwrite: bool,
) -> Result<RepairReport> {
    let mut report = RepairReport::new("assign");
    let records = doc.section_mut(section)?;
    for (key, record) in records.iter_mut() {
        let view = ProductView::from_record(record);
        let Value::Object(fields) = record else {
            continue;
        };
        report.examined += 1;
        let current = view.warehouse_code();

        let target = if view.stock == 0 {
            None
        } else if current.is_some() && !overwrite {
            continue;
        } else {
            view.ledger()
                .and_then(|ledger| ledger.primary_warehouse())
                .or_else(|| assigner.assign(view.stock))
        };
        if target == current && view.warehouse.is_some() == target.is_some() {
            continue;
        }
        report.changes.push(format!(
            "{}: {} -> {}",
            key,
            view.warehouse.as_deref().unwrap_or("null"),
            target.map_or("null", |w| w.as_str())
        ));
        fields.insert(FIELD_WAREHOUSE.into(), warehouse_value(target));
    }
    report.changed = report.changes.len();
    Ok(report)
}
