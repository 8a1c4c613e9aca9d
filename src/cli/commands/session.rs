use clap::{builder::BoolishValueParser, Arg, ArgAction, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_MEDIA_ROOT: &str = "media-root";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("AUTHLY_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("AUTHLY_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_MEDIA_ROOT)
                .long(ARG_MEDIA_ROOT)
                .help("Directory where uploaded profile pictures are stored")
                .env("AUTHLY_MEDIA_ROOT")
                .default_value("media"),
        )
}
