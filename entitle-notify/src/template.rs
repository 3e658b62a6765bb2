//! Literal placeholder substitution for notification templates.
//!
//! Templates are operator-authored HTML, so substitution is plain string
//! replacement with no escaping or control flow.

use entitle_store::FREE_VALID_DAYS;

pub const PRODUCT_NAME_VAR: &str = "{{.ProductName}}";
pub const EMAIL_VAR: &str = "{{.Email}}";
pub const SN_VAR: &str = "{{.SN}}";

/// Per-recipient values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub product_name: String,
    pub email: String,
    /// Empty when the recipient holds no SN.
    pub sn: String,
}

/// Replaces every placeholder in `template`.
#[must_use]
pub fn render(template: &str, vars: &TemplateVars) -> String {
    template
        .replace(PRODUCT_NAME_VAR, &vars.product_name)
        .replace(EMAIL_VAR, &vars.email)
        .replace(SN_VAR, &vars.sn)
}

/// Subject and HTML body of the notice sent after an SN is bound.
#[must_use]
pub fn sn_issued_message(product_name: &str, sn: &str, valid_days: i64) -> (String, String) {
    let subject = format!("Your {product_name} serial number");
    let validity = if valid_days >= FREE_VALID_DAYS {
        "It does not expire.".to_string()
    } else {
        format!("It is valid for {valid_days} days from today.")
    };
    let body = format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:20px\">\
         <h2>{product_name}</h2>\
         <p>Thank you for your request. Your serial number is:</p>\
         <p style=\"font-size:20px;font-family:monospace;letter-spacing:2px\"><strong>{sn}</strong></p>\
         <p>{validity}</p>\
         <p>Enter it in the application to activate.</p>\
         </div>"
    );
    (subject, body)
}
