pub mod agent;
pub mod fix_script;
pub mod json;
pub mod markdown;
pub mod sarif;

use crate::core::FindingFix;

/// HTTP verb for applying a fix descriptor. Everything the rule catalog
/// emits today is a PATCH; the match keeps the mapping explicit.
pub(crate) fn fix_method(fix: &FindingFix) -> &'static str {
    match fix.fix_type.as_str() {
        "update_settings" | "update_index" => "PATCH",
        _ => "PATCH",
    }
}
