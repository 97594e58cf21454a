//! Thing registry — one or many Things served under a base path.

use serde_json::{Value, json};

use webthing_domain::ThingHandle;

/// The Things a server exposes.
#[derive(Debug, Clone)]
pub enum ThingRegistry {
    /// A single Thing mounted directly at the base path.
    Single(ThingHandle),
    /// Several Things, each mounted at `{base_path}/{index}`.
    Multiple {
        things: Vec<ThingHandle>,
        name: String,
    },
}

impl ThingRegistry {
    /// Set every Thing's href prefix for `base_path`.
    ///
    /// A trailing `/` is ignored, so `"/"` and `""` both mount at the root.
    pub fn mount(&self, base_path: &str) {
        let base_path = base_path.trim_end_matches('/');
        match self {
            Self::Single(thing) => thing.write().set_href_prefix(base_path),
            Self::Multiple { things, .. } => {
                for (index, thing) in things.iter().enumerate() {
                    thing.write().set_href_prefix(format!("{base_path}/{index}"));
                }
            }
        }
        tracing::info!(base_path, things = self.things().len(), "things mounted");
    }

    /// Look up a Thing. A single registry ignores `index`.
    #[must_use]
    pub fn get_thing(&self, index: Option<usize>) -> Option<ThingHandle> {
        match self {
            Self::Single(thing) => Some(thing.clone()),
            Self::Multiple { things, .. } => things.get(index?).cloned(),
        }
    }

    #[must_use]
    pub fn things(&self) -> &[ThingHandle] {
        match self {
            Self::Single(thing) => std::slice::from_ref(thing),
            Self::Multiple { things, .. } => things,
        }
    }

    /// The registry name: the Thing's title for a single Thing.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Single(thing) => thing.read().title().to_owned(),
            Self::Multiple { name, .. } => name.clone(),
        }
    }

    /// Thing Descriptions with their `href` added: an object for a single
    /// Thing, an array for several.
    #[must_use]
    pub fn descriptions(&self) -> Value {
        match self {
            Self::Single(thing) => describe(thing),
            Self::Multiple { things, .. } => things.iter().map(describe).collect(),
        }
    }
}

fn describe(thing: &ThingHandle) -> Value {
    let thing = thing.read();
    let mut description = thing.as_thing_description();
    if let Value::Object(map) = &mut description {
        map.insert("href".to_owned(), json!(thing.href()));
    }
    description
}
