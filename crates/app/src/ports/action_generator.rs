//! Action generator port — turns an action request into an [`Action`].

use serde_json::Value;
use webthing_domain::{Action, ThingHandle};

/// Creates the action instance backing an inbound request.
///
/// Returning `None` declines the request, e.g. for an action name the
/// device does not know how to perform.
pub trait ActionGenerator: Send + Sync {
    fn generate(&self, thing: &ThingHandle, name: &str, input: Option<Value>) -> Option<Action>;
}

impl<F> ActionGenerator for F
where
    F: Fn(&ThingHandle, &str, Option<Value>) -> Option<Action> + Send + Sync,
{
    fn generate(&self, thing: &ThingHandle, name: &str, input: Option<Value>) -> Option<Action> {
        self(thing, name, input)
    }
}
