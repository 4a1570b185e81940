//! Access policy.
//!
//! Pure mapping from route class and resolved access level to a
//! disposition. Rules are ordered; the first match governs.

use crate::routing::RouteClass;

/// What the gate learned about the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No user could be resolved (no cookie, bad token, provider error).
    Anonymous,
    /// A user was resolved; the unlock flag was not consulted or is false.
    Authenticated,
    /// A user was resolved and has the unlock flag set.
    Unlocked,
}

/// Where a redirect points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    PublicRoot,
    Landing,
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Forward,
    Redirect(RedirectTarget),
}

impl Disposition {
    /// Label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Forward => "forward",
            Disposition::Redirect(RedirectTarget::PublicRoot) => "redirect_root",
            Disposition::Redirect(RedirectTarget::Landing) => "redirect_landing",
        }
    }
}

/// True when evaluating `class` needs the unlock flag.
pub fn needs_unlock_flag(class: RouteClass) -> bool {
    class == RouteClass::Unlocked
}

/// Evaluate the access policy.
pub fn evaluate(class: RouteClass, access: Access) -> Disposition {
    match (class, access) {
        (RouteClass::Authenticated | RouteClass::Unlocked, Access::Anonymous) => {
            Disposition::Redirect(RedirectTarget::PublicRoot)
        }
        (RouteClass::Unlocked, Access::Authenticated) => {
            Disposition::Redirect(RedirectTarget::Landing)
        }
        (RouteClass::PublicRoot, Access::Authenticated | Access::Unlocked) => {
            Disposition::Redirect(RedirectTarget::Landing)
        }
        _ => Disposition::Forward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Disposition = Disposition::Redirect(RedirectTarget::PublicRoot);
    const LANDING: Disposition = Disposition::Redirect(RedirectTarget::Landing);

    #[test]
    fn test_anonymous() {
        assert_eq!(evaluate(RouteClass::Unlocked, Access::Anonymous), ROOT);
        assert_eq!(evaluate(RouteClass::Authenticated, Access::Anonymous), ROOT);
        assert_eq!(evaluate(RouteClass::PublicRoot, Access::Anonymous), Disposition::Forward);
        assert_eq!(evaluate(RouteClass::Public, Access::Anonymous), Disposition::Forward);
    }

    #[test]
    fn test_authenticated_without_unlock() {
        assert_eq!(evaluate(RouteClass::Unlocked, Access::Authenticated), LANDING);
        assert_eq!(
            evaluate(RouteClass::Authenticated, Access::Authenticated),
            Disposition::Forward
        );
        assert_eq!(evaluate(RouteClass::PublicRoot, Access::Authenticated), LANDING);
    }

    #[test]
    fn test_unlocked() {
        assert_eq!(evaluate(RouteClass::Unlocked, Access::Unlocked), Disposition::Forward);
        assert_eq!(evaluate(RouteClass::Authenticated, Access::Unlocked), Disposition::Forward);
        assert_eq!(evaluate(RouteClass::PublicRoot, Access::Unlocked), LANDING);
    }

    #[test]
    fn test_assets_always_forward() {
        for access in [Access::Anonymous, Access::Authenticated, Access::Unlocked] {
            assert_eq!(evaluate(RouteClass::Asset, access), Disposition::Forward);
        }
    }
}
