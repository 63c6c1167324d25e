//! `untappd users`.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Directory, Handler};

pub const UNTAPPD_HELP: &str =
    "untappd users: list the untappd users whose check-ins I announce in the channel";

pub const UNTAPPD_USAGE: &str = "try 'help untappd'";

pub struct UntappdHandler {
    users: Arc<dyn Directory>,
}

impl UntappdHandler {
    pub fn new(users: Arc<dyn Directory>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Handler for UntappdHandler {
    async fn handle(&self, args: &[String]) -> String {
        match args.first().map(String::as_str) {
            Some("users") => self.users.describe(),
            _ => UNTAPPD_USAGE.to_string(),
        }
    }

    fn help(&self) -> Option<&'static str> {
        Some(UNTAPPD_HELP)
    }
}
