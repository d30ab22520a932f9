//! Human-readable replies for the command interface collaborator.
//!
//! Every outcome maps to a distinct message: "pool empty", "your input was
//! invalid", and "internal failure" must stay distinguishable all the way
//! to the interface layer.

use crate::ServiceError;
use credpool_session::SessionError;
use credpool_store::InventoryError;
use credpool_types::{ArchivedRecord, CategoryId};

pub fn added(category: &str, count: usize) -> String {
    format!("Added to {category}. Available now: {count}.")
}

pub fn dispensed(category: &str, record: &ArchivedRecord) -> String {
    format!("Your {category} account: {}", record.account)
}

pub fn counts(entries: &[(CategoryId, usize)]) -> String {
    let mut out = String::from("Available accounts:");
    for (category, count) in entries {
        out.push_str(&format!("\n- {category}: {count}"));
    }
    out
}

pub fn categories(names: &[CategoryId]) -> String {
    let mut out = String::from("Services:");
    for name in names {
        out.push_str(&format!("\n- {name}"));
    }
    out
}

pub fn logged_in(display_name: &str) -> String {
    format!("Authenticated as {display_name}.")
}

pub fn logged_out() -> String {
    "Session closed.".to_string()
}

pub fn failure(err: &ServiceError) -> String {
    match err {
        ServiceError::NotAuthenticated => "You must log in first.".to_string(),
        ServiceError::Session(SessionError::InvalidSecret) => "Wrong passphrase.".to_string(),
        ServiceError::Session(SessionError::WasNotAuthenticated) => {
            "You were not logged in.".to_string()
        }
        ServiceError::Inventory(InventoryError::Empty(category)) => {
            format!("No accounts available for {category}.")
        }
        ServiceError::Inventory(InventoryError::InvalidFormat(reason)) => {
            format!("Invalid format ({reason}). Use: identifier:secret")
        }
        ServiceError::Inventory(InventoryError::InvalidCategory(reason)) => {
            format!("Invalid service name: {reason}")
        }
        ServiceError::Inventory(InventoryError::UnknownCategory(name)) => {
            format!("Unknown service: {name}")
        }
        ServiceError::Config(reason) => format!("Configuration problem: {reason}"),
        _ => "Internal failure, try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credpool_types::RecordParseError;

    #[test]
    fn outcome_classes_stay_distinguishable() {
        let empty = failure(&ServiceError::Inventory(InventoryError::Empty(
            CategoryId::parse("netflix").unwrap(),
        )));
        let invalid = failure(&ServiceError::Inventory(InventoryError::InvalidFormat(
            RecordParseError::MissingSeparator,
        )));
        let internal = failure(&ServiceError::Session(SessionError::LockError));

        assert_ne!(empty, invalid);
        assert_ne!(empty, internal);
        assert_ne!(invalid, internal);
        assert!(empty.contains("netflix"));
        assert!(internal.contains("Internal failure"));
    }

    #[test]
    fn count_listing_names_every_category() {
        let text = counts(&[
            (CategoryId::parse("disney").unwrap(), 0),
            (CategoryId::parse("netflix").unwrap(), 3),
        ]);
        assert!(text.contains("- disney: 0"));
        assert!(text.contains("- netflix: 3"));
    }
}
