use std::collections::HashSet;

/// Fixed administrator set, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    admins: HashSet<i64>,
}

impl AccessGuard {
    pub fn new<I>(admins: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}
