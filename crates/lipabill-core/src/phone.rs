//! MSISDN normalization for the Kenyan numbering plan.
//!
//! Safaricom's Daraja API requires phone numbers in international format
//! with no leading `+` and no trunk prefix (`2547XXXXXXXX`). Users enter
//! numbers in whatever local convention they are used to, so the payment
//! paths normalize just before building the provider request.

/// Kenya country calling code, without the `+`.
pub const COUNTRY_CODE: &str = "254";

/// Normalize a locally-formatted Kenyan phone number to the international
/// format Daraja expects.
///
/// Rules, in priority order:
/// 1. `+254…` → strip the leading `+`
/// 2. `0…` → replace the trunk `0` with `254`
/// 3. `7…` / `1…` (bare subscriber number) → prepend `254`
/// 4. anything else is returned unchanged
///
/// Best-effort: the function never fails and does not validate length or
/// character set. Applying it twice yields the same result as applying it
/// once.
pub fn normalize_msisdn(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix('+') {
        if rest.starts_with(COUNTRY_CODE) {
            return rest.to_string();
        }
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix('0') {
        return format!("{COUNTRY_CODE}{rest}");
    }
    if raw.starts_with('7') || raw.starts_with('1') {
        return format!("{COUNTRY_CODE}{raw}");
    }
    raw.to_string()
}
