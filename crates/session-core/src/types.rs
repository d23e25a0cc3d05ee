use serde::{Deserialize, Serialize};

/// Which side of the consultation this process is running for.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    /// The consultation seeker; pays for the session.
    Client,
    /// The service provider; earns from the session.
    Provider,
}

impl Role {
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Client => Role::Provider,
            Role::Provider => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Provider => write!(f, "provider"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_flips_the_side() {
        assert_eq!(Role::Client.counterpart(), Role::Provider);
        assert_eq!(Role::Provider.counterpart(), Role::Client);
    }
}
