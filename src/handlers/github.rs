//! `github repos`.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Directory, Handler};

pub const GITHUB_HELP: &str =
    "github repos: list the repositories whose activity I announce in the channel";

pub const GITHUB_USAGE: &str = "try 'help github'";

pub struct GithubHandler {
    repos: Arc<dyn Directory>,
}

impl GithubHandler {
    pub fn new(repos: Arc<dyn Directory>) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl Handler for GithubHandler {
    async fn handle(&self, args: &[String]) -> String {
        match args.first().map(String::as_str) {
            Some("repos") => self.repos.describe(),
            _ => GITHUB_USAGE.to_string(),
        }
    }

    fn help(&self) -> Option<&'static str> {
        Some(GITHUB_HELP)
    }
}
