use serde::{Deserialize, Serialize};

/// How functions are offered to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Functions are advertised; the model decides whether to call one.
    #[default]
    Auto,
    /// Functions are advertised and the model is told it must call one.
    Required,
    /// No functions are advertised; requests pass straight through.
    None,
}

impl Behavior {
    /// Whether any function is advertised under this behavior.
    pub fn advertises(self) -> bool {
        !matches!(self, Behavior::None)
    }
}
