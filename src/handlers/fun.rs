//! `fly` and `flip`.

use async_trait::async_trait;

use super::Handler;

pub const FLY_TEXT: &str = "PPPPPPFFFFFfffffffffiiiiiiiiiuuuuuuuuuuuuuuuu.....................";

pub const FLIP_PREFIX: &str = "(ﾉಥ益ಥ）ﾉ ┻━┻ ";

pub struct FlyHandler;

#[async_trait]
impl Handler for FlyHandler {
    async fn handle(&self, _args: &[String]) -> String {
        FLY_TEXT.to_string()
    }
}

/// Flips the table, then says whatever followed.
pub struct FlipHandler;

#[async_trait]
impl Handler for FlipHandler {
    async fn handle(&self, args: &[String]) -> String {
        format!("{FLIP_PREFIX}{}", args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, registry};
    use super::*;

    #[tokio::test]
    async fn test_fly_ignores_arguments() {
        let registry = registry();
        assert_eq!(registry.handle("fly", &[]).await, FLY_TEXT);
        assert_eq!(registry.handle("fly", &args("away now")).await, FLY_TEXT);
    }

    #[tokio::test]
    async fn test_flip_appends_arguments() {
        assert_eq!(
            registry().handle("flip", &args("look at this")).await,
            "(ﾉಥ益ಥ）ﾉ ┻━┻ look at this"
        );
    }

    #[tokio::test]
    async fn test_bare_flip_keeps_trailing_space() {
        assert_eq!(registry().handle("flip", &[]).await, FLIP_PREFIX);
    }
}
