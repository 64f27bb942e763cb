//! The vocabulary rule: a variable name that mentions a measurable
//! substance must also carry a unit token. `spec.md` §3 invariant 6,
//! §9 ("vocabulary rule as data" — the lists below are configuration,
//! not code, and a caller is free to build a `VocabularyRules` with
//! its own lists).

use crate::diagnostic::Diagnostic;

#[derive(Debug, Clone)]
pub struct VocabularyRules {
    pub measurable_substances: Vec<String>,
    pub unit_tokens: Vec<String>,
    pub countable_suffixes: Vec<String>,
}

impl Default for VocabularyRules {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        VocabularyRules {
            measurable_substances: words(&[
                "water", "flour", "oil", "fabric", "fuel", "chemicals", "metal", "sugar", "salt",
                "butter", "milk", "chicken", "beef", "pork", "rice", "wood", "plastic", "paint",
                "cement", "yeast", "dough",
            ]),
            unit_tokens: words(&[
                "cups", "cup", "grams", "gram", "g", "kg", "liters", "liter", "l", "ml", "tbsp",
                "tsp", "oz", "lb", "lbs", "gallon", "gallons", "quart", "quarts", "pint", "pints",
                "cm", "m", "mm", "in", "inch", "meter", "meters", "yard", "yards",
            ]),
            countable_suffixes: words(&["count", "units", "servings", "pieces"]),
        }
    }
}

fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

impl VocabularyRules {
    /// Checks a single variable name, returning a [`Diagnostic`] if it
    /// names a measurable substance without a unit token.
    pub fn check(&self, name: &str) -> Result<(), Diagnostic> {
        let tokens = tokenize(name);

        let is_countable = tokens
            .last()
            .map(|last| self.countable_suffixes.iter().any(|s| s == last))
            .unwrap_or(false);
        if is_countable {
            return Ok(());
        }

        let substance = tokens
            .iter()
            .find(|tok| self.measurable_substances.iter().any(|s| s == *tok));
        let Some(substance) = substance else {
            return Ok(());
        };

        let has_unit = tokens.iter().any(|tok| self.unit_tokens.iter().any(|u| u == tok));
        if has_unit {
            return Ok(());
        }

        Err(Diagnostic::BadVariableName {
            name: name.to_string(),
            substance: substance.clone(),
            missing_unit_hint: format!(
                "add one of: {}",
                self.unit_tokens.get(..5).unwrap_or(&self.unit_tokens).join(", ")
            ),
        })
    }

    /// Checks every key in a ledger, short-circuiting on the first bad
    /// name (deterministic order since `Ledger` is a `BTreeMap`).
    pub fn check_ledger(&self, ledger: &crate::model::Ledger) -> Result<(), Diagnostic> {
        for name in ledger.keys() {
            self.check(name.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_substance_is_rejected() {
        let rules = VocabularyRules::default();
        assert!(rules.check("flour").is_err());
    }

    #[test]
    fn substance_with_unit_is_accepted() {
        let rules = VocabularyRules::default();
        assert!(rules.check("flour_grams").is_ok());
    }

    #[test]
    fn countable_suffix_is_accepted_even_with_substance() {
        let rules = VocabularyRules::default();
        assert!(rules.check("bowls_count").is_ok());
    }

    #[test]
    fn non_substance_word_is_always_accepted() {
        let rules = VocabularyRules::default();
        assert!(rules.check("morale").is_ok());
    }

    #[test]
    fn multi_token_substance_with_unit_suffix_is_accepted() {
        let rules = VocabularyRules::default();
        assert!(rules.check("diced_chicken_lbs").is_ok());
    }
}
