use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// What the user picked on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterForm {
    pub base_type: String,
    pub features: Vec<String>,
}

impl MonsterForm {
    pub fn new(base_type: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            base_type: base_type.into(),
            features,
        }
    }

    /// Rejects a form with no checked feature before anything touches the network.
    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.features.is_empty() {
            return Err(ForgeError::Validation);
        }
        Ok(())
    }

    pub fn prompt(&self) -> Result<String, ForgeError> {
        self.validate()?;
        Ok(build_prompt(&self.base_type, &self.features))
    }
}

/// Turns a base type and its features into the image prompt.
///
/// Features keep the order they were given in.
pub fn build_prompt<S: AsRef<str>>(base_type: &str, features: &[S]) -> String {
    let joined = features
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "A terrifying {} with {}, rendered in cinematic concept art style with dramatic lighting.",
        base_type, joined
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dragon_prompt_matches_template() {
        let prompt = build_prompt("dragon", &["glowing eyes", "spiked tail"]);
        assert_eq!(
            prompt,
            "A terrifying dragon with glowing eyes, spiked tail, \
             rendered in cinematic concept art style with dramatic lighting."
        );
    }

    #[test]
    fn same_input_same_prompt_and_order_is_kept() {
        let a = build_prompt("kraken", &["tentacles", "barnacles"]);
        let b = build_prompt("kraken", &["tentacles", "barnacles"]);
        let swapped = build_prompt("kraken", &["barnacles", "tentacles"]);
        assert_eq!(a, b);
        assert_ne!(a, swapped);
        assert!(swapped.contains("with barnacles, tentacles,"));
    }

    #[test]
    fn empty_form_is_rejected() {
        let form = MonsterForm::new("goblin", vec![]);
        assert!(matches!(form.prompt(), Err(ForgeError::Validation)));
    }

    #[test]
    fn single_feature_has_no_separator() {
        let form = MonsterForm::new("goblin", vec!["warts".to_string()]);
        assert_eq!(
            form.prompt().unwrap(),
            "A terrifying goblin with warts, \
             rendered in cinematic concept art style with dramatic lighting."
        );
    }
}
