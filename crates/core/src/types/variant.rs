//! Product variant selection for cart and order line items.

use serde::{Deserialize, Serialize};

/// The variant (color/size) a shopper picked for a line item.
///
/// This is a value type: two selectors are equal iff every field matches,
/// including the case where both are absent. Line items merge on
/// product + selector equality, so the derived `PartialEq` is the single
/// source of truth for "same variant".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl VariantSelector {
    /// A selector with nothing chosen (the product's default variant).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            color: None,
            size: None,
        }
    }

    /// Whether any field is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.color.is_some() || self.size.is_some()
    }
}

impl std::fmt::Display for VariantSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.color, &self.size) {
            (Some(color), Some(size)) => write!(f, "{color} / {size}"),
            (Some(color), None) => write!(f, "{color}"),
            (None, Some(size)) => write!(f, "{size}"),
            (None, None) => write!(f, "-"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn selector(color: Option<&str>, size: Option<&str>) -> VariantSelector {
        VariantSelector {
            color: color.map(str::to_owned),
            size: size.map(str::to_owned),
        }
    }

    #[test]
    fn test_equal_when_all_fields_match() {
        assert_eq!(
            selector(Some("navy"), Some("m")),
            selector(Some("navy"), Some("m"))
        );
    }

    #[test]
    fn test_both_absent_are_equal() {
        assert_eq!(VariantSelector::none(), selector(None, None));
        assert!(!VariantSelector::none().is_selected());
    }

    #[test]
    fn test_partial_selection_differs_from_none() {
        assert_ne!(selector(Some("navy"), None), VariantSelector::none());
        assert_ne!(selector(Some("navy"), None), selector(None, Some("navy")));
    }

    #[test]
    fn test_serde_omits_absent_fields() {
        let json = serde_json::to_string(&selector(Some("red"), None)).unwrap();
        assert_eq!(json, r#"{"color":"red"}"#);
        let json = serde_json::to_string(&VariantSelector::none()).unwrap();
        assert_eq!(json, "{}");
    }
}
