//! Delivery-method catalog.
//!
//! The catalog is fixed: the core only needs membership tests and the fuzzy
//! matching used by CSV import.

use crate::types::DeliveryMethod;
use once_cell::sync::Lazy;

/// Catalog entry describing one delivery method
#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub method: DeliveryMethod,
    pub key: &'static str,
    pub description: &'static str,
}

/// The complete catalog of delivery methods
#[derive(Clone, Debug)]
pub struct Catalog {
    pub methods: Vec<MethodInfo>,
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the catalog of built-in delivery methods
pub fn build_default_catalog() -> Catalog {
    let methods = DeliveryMethod::ALL
        .iter()
        .map(|&method| MethodInfo {
            method,
            key: method.key(),
            description: describe(method),
        })
        .collect();

    Catalog { methods }
}

fn describe(method: DeliveryMethod) -> &'static str {
    match method {
        DeliveryMethod::EvIm => "Estradiol valerate in oil (intramuscular)",
        DeliveryMethod::EenIm => "Estradiol enanthate in sunflower oil (intramuscular)",
        DeliveryMethod::EcIm => "Estradiol cypionate in oil (intramuscular)",
        DeliveryMethod::EbIm => "Estradiol benzoate in oil (intramuscular)",
        DeliveryMethod::EunIm => "Estradiol undecylate in castor oil (intramuscular)",
        DeliveryMethod::EunCasubq => "Estradiol undecylate in castor oil (subcutaneous)",
        DeliveryMethod::PatchTw => "Transdermal estradiol patch (twice-weekly), doses in mg/day",
        DeliveryMethod::PatchOw => "Transdermal estradiol patch (once-weekly), doses in mg/day",
    }
}

impl Catalog {
    /// Exact (case-sensitive) key lookup
    pub fn get(&self, key: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn info(&self, method: DeliveryMethod) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.method == method)
    }

    /// First method whose key contains `token` or is contained in it,
    /// ignoring case. Blank tokens match nothing.
    pub fn find_intersecting(&self, token: &str) -> Option<DeliveryMethod> {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return None;
        }

        self.methods
            .iter()
            .find(|m| {
                let key = m.key.to_lowercase();
                key.contains(&token) || token.contains(&key)
            })
            .map(|m| m.method)
    }

    /// Validate catalog integrity
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (i, info) in self.methods.iter().enumerate() {
            if info.key.trim().is_empty() {
                errors.push(format!("Method {:?} has an empty key", info.method));
            }
            if info.key != info.method.key() {
                errors.push(format!(
                    "Method {:?}: key '{}' does not match '{}'",
                    info.method,
                    info.key,
                    info.method.key()
                ));
            }
            if self.methods[..i]
                .iter()
                .any(|other| other.key.eq_ignore_ascii_case(info.key))
            {
                errors.push(format!("Duplicate method key '{}'", info.key));
            }
        }

        if self.methods.is_empty() {
            errors.push("Catalog has no delivery methods".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.methods.len(), 8);
        assert!(catalog.contains("EV im"));
        assert!(!catalog.contains("ev im"));
    }

    #[test]
    fn test_default_catalog_validates() {
        let errors = get_default_catalog().validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_find_intersecting_case_insensitive() {
        let catalog = get_default_catalog();
        assert_eq!(catalog.find_intersecting("ev im"), Some(DeliveryMethod::EvIm));
        assert_eq!(catalog.find_intersecting("EEN IM"), Some(DeliveryMethod::EenIm));
    }

    #[test]
    fn test_find_intersecting_either_direction() {
        let catalog = get_default_catalog();
        // token contained in key
        assert_eq!(catalog.find_intersecting("casubq"), Some(DeliveryMethod::EunCasubq));
        // key contained in token
        assert_eq!(
            catalog.find_intersecting("patch ow (weekly)"),
            Some(DeliveryMethod::PatchOw)
        );
    }

    #[test]
    fn test_find_intersecting_misses() {
        let catalog = get_default_catalog();
        assert_eq!(catalog.find_intersecting("gel"), None);
        assert_eq!(catalog.find_intersecting("   "), None);
    }

    #[test]
    fn test_duplicate_keys_flagged() {
        let mut catalog = build_default_catalog();
        let first = catalog.methods[0].clone();
        catalog.methods.push(first);
        assert!(!catalog.validate().is_empty());
    }
}
