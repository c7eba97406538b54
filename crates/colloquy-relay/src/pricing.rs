use std::collections::HashMap;

/// Rates in currency per 1000 tokens
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub prompt: f64,
    pub completion: f64,
}

/// Static model price table
///
/// Unknown models cost zero. That is deliberate policy, not an error:
/// tokens for an unpriced model are reported but not billed, and the
/// zero shows up in the usage event where an operator can see it.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new(prices: HashMap<String, ModelPrice>) -> Self {
        Self { prices }
    }

    pub fn cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let Some(price) = self.prices.get(model) else {
            return 0.0;
        };
        (prompt_tokens as f64 / 1000.0) * price.prompt
            + (completion_tokens as f64 / 1000.0) * price.completion
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut prices = HashMap::new();
        prices.insert(
            "gpt-4o-mini".to_string(),
            ModelPrice {
                prompt: 0.00015,
                completion: 0.0006,
            },
        );
        prices.insert(
            "gpt-4o".to_string(),
            ModelPrice {
                prompt: 0.0025,
                completion: 0.01,
            },
        );
        prices.insert(
            "gpt-5".to_string(),
            ModelPrice {
                prompt: 0.00125,
                completion: 0.01,
            },
        );
        prices.insert(
            "gpt-5-mini".to_string(),
            ModelPrice {
                prompt: 0.00025,
                completion: 0.002,
            },
        );
        prices.insert(
            "gpt-5-nano".to_string(),
            ModelPrice {
                prompt: 0.00005,
                completion: 0.0004,
            },
        );
        Self { prices }
    }
}
