//! Request field validation.

use tracing::{debug, warn};

use crate::context::{BODY, Context, PARAMS, QUERY};
use crate::schema::{SharedSchema, ValidationError};

/// The optional schemas for a route's `query`, `params` and `body`.
///
/// Fields are validated in that fixed order. The first rejection stops
/// validation and is returned as-is; fields without a schema are left
/// untouched.
#[derive(Clone, Default)]
pub(crate) struct FieldSchemas {
    pub(crate) query: Option<SharedSchema>,
    pub(crate) params: Option<SharedSchema>,
    pub(crate) body: Option<SharedSchema>,
}

impl FieldSchemas {
    pub(crate) fn apply(&self, ctx: &mut Context) -> Result<(), ValidationError> {
        for (field, schema) in [(QUERY, &self.query), (PARAMS, &self.params), (BODY, &self.body)] {
            let Some(schema) = schema else { continue };

            let raw = ctx.take(field);
            match schema.parse(raw) {
                Ok(parsed) => {
                    debug!(field, "validated");
                    ctx.insert(field, parsed);
                }
                Err(err) => {
                    warn!(field, error = %err, "request validation failed");
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
