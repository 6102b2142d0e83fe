// ── Attribute diffing ──

use crate::error::CoreError;
use crate::model::{AttributeDiff, CurrentAttributes, DesiredAttributes};
use crate::registry::AttributeRegistry;

/// Desired entries whose coerced value differs from the coerced current one.
///
/// Every desired key must be known to the registry, changed or not. Only
/// changed values are checked against registry constraints, so a read-only
/// attribute already at its desired value is not an error.
pub fn compute_diff(
    registry: &AttributeRegistry,
    desired: &DesiredAttributes,
    current: &CurrentAttributes,
) -> Result<AttributeDiff, CoreError> {
    let mut diff = AttributeDiff::new();

    for (name, wanted) in desired {
        let wanted = registry.coerce(name, wanted)?;
        let have = match current.get(name) {
            Some(raw) => registry.coerce_current(name, raw)?,
            None => None,
        };

        if have.as_ref() == Some(&wanted) {
            continue;
        }

        registry.check_value(name, &wanted)?;
        diff.insert(name.clone(), wanted);
    }

    Ok(diff)
}
