use hosh_primitives::Module;

/// Builds the subject hierarchy under a configurable prefix (`hosh.` by
/// default, trailing dot included).
#[derive(Clone, Debug)]
pub struct Subjects {
    prefix: String,
}

impl Subjects {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Scheduled check requests for a module.
    pub fn check(&self, module: Module) -> String {
        format!("{}check.{}", self.prefix, module)
    }

    /// Priority lane for user-submitted checks; consumed by the same queue
    /// group as the scheduled lane.
    pub fn check_user(&self, module: Module) -> String {
        format!("{}check.{}.user", self.prefix, module)
    }

    /// On-demand trigger subject bypassing the staleness gate.
    pub fn trigger(&self, module: Module) -> String {
        format!("{}check.{}.trigger", self.prefix, module)
    }

    /// Completed check results, consumed by the chronicler.
    pub fn result(&self, module: Module) -> String {
        format!("{}result.{}", self.prefix, module)
    }

    /// Side subject for dry-run results; nothing persists these.
    pub fn result_dry_run(&self, module: Module) -> String {
        format!("{}result.{}.dry_run", self.prefix, module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_layout() {
        let subjects = Subjects::new("hosh.");
        assert_eq!(subjects.check(Module::Btc), "hosh.check.btc");
        assert_eq!(subjects.check_user(Module::Btc), "hosh.check.btc.user");
        assert_eq!(subjects.trigger(Module::Zec), "hosh.check.zec.trigger");
        assert_eq!(subjects.result(Module::Http), "hosh.result.http");
        assert_eq!(
            subjects.result_dry_run(Module::Http),
            "hosh.result.http.dry_run"
        );
    }

    #[test]
    fn test_custom_prefix() {
        let subjects = Subjects::new("staging.hosh.");
        assert_eq!(subjects.check(Module::Btc), "staging.hosh.check.btc");
    }
}
