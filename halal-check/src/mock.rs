//! Deterministic stand-in for the classification service.
//!
//! Serves mock mode and the orchestrator's fallback path alike, so both produce identical
//! records for the same input.

use crate::models::{IngredientQuery, IngredientResult, IngredientStatus};

struct CertificateEntry {
    name: &'static str,
    status: IngredientStatus,
    expiry_date: &'static str,
    supplier: &'static str,
    certificate_id: &'static str,
}

const CERTIFICATES: &[CertificateEntry] = &[
    CertificateEntry {
        name: "corn starch",
        status: IngredientStatus::Certified,
        expiry_date: "2025-12-15",
        supplier: "Halal Foods Sdn Bhd",
        certificate_id: "JAKIM-2024-001",
    },
    CertificateEntry {
        name: "soy lecithin",
        status: IngredientStatus::Certified,
        expiry_date: "2025-07-10",
        supplier: "Malaysian Soy Industries",
        certificate_id: "JAKIM-2024-002",
    },
    CertificateEntry {
        name: "vanilla extract",
        status: IngredientStatus::Certified,
        expiry_date: "2025-08-15",
        supplier: "Flavor Masters Sdn Bhd",
        certificate_id: "JAKIM-2024-015",
    },
    CertificateEntry {
        name: "citric acid",
        status: IngredientStatus::Certified,
        expiry_date: "2025-11-30",
        supplier: "Chemical Solutions Malaysia",
        certificate_id: "JAKIM-2024-020",
    },
    CertificateEntry {
        name: "xanthan gum",
        status: IngredientStatus::Certified,
        expiry_date: "2026-03-20",
        supplier: "Biotech Ingredients Malaysia",
        certificate_id: "JAKIM-2024-008",
    },
    CertificateEntry {
        name: "lecithin",
        status: IngredientStatus::Certified,
        expiry_date: "2025-09-30",
        supplier: "Natural Ingredients Co.",
        certificate_id: "JAKIM-2024-012",
    },
    CertificateEntry {
        name: "gellan gum",
        status: IngredientStatus::Certified,
        expiry_date: "2025-11-15",
        supplier: "Bio Gums Malaysia",
        certificate_id: "JAKIM-2024-018",
    },
];

// Checked in order; the first keyword contained in the message wins.
const CHAT_RESPONSES: &[(&str, &str)] = &[
    (
        "halal",
        "Halal refers to what is permissible according to Islamic law. In food, it means the food is prepared according to Islamic dietary guidelines.",
    ),
    (
        "haram",
        "Haram refers to anything forbidden by Islamic law. Common haram ingredients include pork, alcohol, and certain food additives.",
    ),
    (
        "certificate",
        "Halal certificates are issued by recognized Islamic organizations to verify that products comply with Islamic dietary laws.",
    ),
    (
        "gelatin",
        "Gelatin can be halal or haram depending on its source. Gelatin from halal-slaughtered animals or fish is halal, while gelatin from pork is haram.",
    ),
    (
        "alcohol",
        "Alcohol is generally considered haram in Islam. However, some scholars allow trace amounts that occur naturally in food processing.",
    ),
    (
        "chicken",
        "Chicken is halal if it's slaughtered according to Islamic guidelines by a Muslim who says \"Bismillah\" (In the name of Allah).",
    ),
    (
        "beef",
        "Beef is halal when the cattle is slaughtered according to Islamic law, ensuring the animal is healthy and the slaughter is performed correctly.",
    ),
    (
        "pork",
        "Pork is haram (forbidden) in Islam and cannot be consumed by Muslims under any circumstances.",
    ),
    (
        "wine",
        "Wine contains alcohol and is considered haram in Islam. Muslims should avoid consuming wine and products containing wine.",
    ),
    (
        "certification",
        "Halal certification ensures that food products comply with Islamic dietary laws. Look for certificates from recognized Islamic authorities like JAKIM in Malaysia.",
    ),
];

const QUESTION_REPLY: &str = "That's a great question! I'd be happy to help you with halal ingredient information. Try asking about specific ingredients, certification processes, or halal dietary guidelines.";
const THANKS_REPLY: &str =
    "You're welcome! I'm here to help with any halal ingredient questions you might have.";
const GREETING_REPLY: &str = "Hello! I'm here to help you with halal ingredient information. Feel free to ask me about any ingredients or halal dietary guidelines.";
const GENERIC_REPLY: &str = "I understand you're asking about halal ingredients. Could you be more specific about what you'd like to know? I can help with ingredient certification, dietary guidelines, or specific food items.";

/// Fixed lookup table for ingredient certificates and chat answers
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    /// Certificate record for one ingredient; the `ingredient` field echoes the input.
    pub fn lookup(&self, ingredient: &str) -> IngredientResult {
        let key = ingredient.trim().to_lowercase();

        match CERTIFICATES.iter().find(|entry| entry.name == key) {
            Some(entry) => IngredientResult {
                ingredient: ingredient.to_string(),
                status: entry.status,
                expiry_date: entry.expiry_date.to_string(),
                supplier: entry.supplier.to_string(),
                certificate_id: entry.certificate_id.to_string(),
            },
            None => IngredientResult::not_found(ingredient),
        }
    }

    pub fn check(&self, query: &IngredientQuery) -> Vec<IngredientResult> {
        query.iter().map(|ingredient| self.lookup(ingredient)).collect()
    }

    pub fn chat_reply(&self, message: &str) -> String {
        let lower = message.to_lowercase();

        if let Some((_, reply)) = CHAT_RESPONSES
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
        {
            return reply.to_string();
        }

        let reply = if lower.contains('?') {
            QUESTION_REPLY
        } else if lower.contains("thank") {
            THANKS_REPLY
        } else if lower.contains("hello") || lower.contains("hi") {
            GREETING_REPLY
        } else {
            GENERIC_REPLY
        };
        reply.to_string()
    }
}
