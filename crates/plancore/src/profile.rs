use crate::ProfileError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved fallback name, resolved when no explicit profile is requested or
/// the requested name is absent under a kind.
pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// Registry mapping (capability kind, profile name) to a behavior object.
///
/// Built once before execution and then read-only; lookups take `&self` and
/// are safe from any number of concurrently running nodes. Leaf tasks
/// retrieve profiles by concrete type; kinds are plain string identifiers
/// owned by the task library (e.g. "plan", "solver").
#[derive(Default)]
pub struct ProfileDictionary {
    profiles: HashMap<(String, String), Arc<dyn Any + Send + Sync>>,
}

impl ProfileDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(
        &mut self,
        kind: impl Into<String>,
        name: impl Into<String>,
        profile: T,
    ) {
        self.profiles
            .insert((kind.into(), name.into()), Arc::new(profile));
    }

    pub fn has(&self, kind: &str, name: &str) -> bool {
        self.profiles
            .contains_key(&(kind.to_string(), name.to_string()))
    }

    /// Profile names registered under a kind.
    pub fn names(&self, kind: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .keys()
            .filter(|(k, _)| k == kind)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Resolve `(kind, name)`, falling back to `DEFAULT` under the same kind.
    ///
    /// An entry stored under the right key but with a different concrete type
    /// also resolves to `NotFound`: the caller asked for a capability this
    /// entry does not provide.
    pub fn resolve<T: Send + Sync + 'static>(
        &self,
        kind: &str,
        name: &str,
    ) -> Result<Arc<T>, ProfileError> {
        let exact = self
            .profiles
            .get(&(kind.to_string(), name.to_string()))
            .and_then(|p| p.clone().downcast::<T>().ok());
        if let Some(profile) = exact {
            return Ok(profile);
        }
        self.profiles
            .get(&(kind.to_string(), DEFAULT_PROFILE.to_string()))
            .and_then(|p| p.clone().downcast::<T>().ok())
            .ok_or_else(|| ProfileError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    /// Whether `name` resolves under `kind`, directly or through DEFAULT.
    pub fn resolves(&self, kind: &str, name: &str) -> bool {
        self.has(kind, name) || self.has(kind, DEFAULT_PROFILE)
    }
}

/// Profile-name precedence used across leaf tasks: the instruction override
/// wins, then the enclosing group, then DEFAULT.
pub fn profile_name<'a>(
    instruction_profile: Option<&'a str>,
    group_profile: Option<&'a str>,
) -> &'a str {
    instruction_profile
        .or(group_profile)
        .unwrap_or(DEFAULT_PROFILE)
}
