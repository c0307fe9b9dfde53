// Engine error taxonomy and what the player does about each kind

use crate::engine::TrackKind;

/// Hosts whose signed URLs expire; a 403 from them is retried by resuming
const SIGNED_URL_HOSTS: [&str; 2] = ["aliyuncs.com", "aliyundrive.net"];

const UNRECOGNIZED_FORMAT: &str = "None of the available extractors could read the stream.";

/// Root cause of a loader failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCause {
    Security(Option<String>),
    IllegalArgument,
    IllegalState(Option<String>),
    Other(Option<String>),
}

/// Playback failures as classified by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The server answered with a non-success HTTP status
    HttpStatus {
        code: u16,
        host: Option<String>,
        body: String,
    },
    /// Connection-level HTTP failure
    HttpConnection { timeout: bool, message: Option<String> },
    /// Reading a local file failed
    File { not_found: bool, message: Option<String> },
    /// A decoder could not be created or failed while decoding
    Decoder {
        track: TrackKind,
        message: Option<String>,
    },
    UnrecognizedFormat,
    /// A live stream fell behind the available window
    BehindLiveWindow { message: Option<String> },
    Loader {
        cause: LoaderCause,
        message: Option<String>,
    },
    Other { message: Option<String> },
}

/// Automatic recovery actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Resume playback, refreshing an expired signed URL
    Resume,
    /// Drop the failing track kind and prepare again
    DisableTrack(TrackKind),
    /// Prepare again and resume
    Restart,
    /// Continue with the next playlist entry
    SkipToNext,
}

impl Recovery {
    /// Actions that retry the same item may only run once for it
    pub fn retries_item(self) -> bool {
        !matches!(self, Recovery::SkipToNext)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Recover { action: Recovery, message: String },
    Fatal(String),
}

fn text(message: &Option<String>) -> String {
    message.clone().unwrap_or_else(|| "Unknown Error".to_string())
}

fn is_signed_url_host(host: &str) -> bool {
    SIGNED_URL_HOSTS.iter().any(|suffix| host.ends_with(suffix))
}

/// Decide how to handle `error`. `has_next` tells whether another playlist entry follows.
pub fn classify(error: &EngineError, has_next: bool) -> Outcome {
    match error {
        EngineError::HttpStatus { code, host, body } => {
            let message = format!("{} {}", code, body);
            if *code == 403 && host.as_deref().is_some_and(is_signed_url_host) {
                Outcome::Recover {
                    action: Recovery::Resume,
                    message,
                }
            } else {
                Outcome::Fatal(message)
            }
        }
        EngineError::HttpConnection { timeout: true, .. } => {
            Outcome::Fatal("Connection Timeout".to_string())
        }
        EngineError::HttpConnection { message, .. } => Outcome::Fatal(text(message)),
        EngineError::File { not_found: true, .. } => {
            Outcome::Fatal("This File is Not Found".to_string())
        }
        EngineError::File { message, .. } => Outcome::Fatal(text(message)),
        EngineError::Decoder { track, message } => Outcome::Recover {
            action: Recovery::DisableTrack(*track),
            message: text(message),
        },
        EngineError::UnrecognizedFormat => Outcome::Fatal(UNRECOGNIZED_FORMAT.to_string()),
        EngineError::BehindLiveWindow { message } => Outcome::Recover {
            action: Recovery::Restart,
            message: text(message),
        },
        EngineError::Loader { cause, message } => match cause {
            LoaderCause::Security(detail) => Outcome::Fatal(text(detail)),
            LoaderCause::IllegalArgument => Outcome::Fatal(text(message)),
            LoaderCause::IllegalState(detail) if has_next => Outcome::Recover {
                action: Recovery::SkipToNext,
                message: text(detail),
            },
            LoaderCause::IllegalState(detail) => Outcome::Fatal(text(detail)),
            LoaderCause::Other(detail) => Outcome::Fatal(text(detail)),
        },
        EngineError::Other { message } => Outcome::Fatal(text(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(code: u16, host: &str) -> EngineError {
        EngineError::HttpStatus {
            code,
            host: Some(host.to_string()),
            body: "denied".into(),
        }
    }

    #[test]
    fn test_expired_signature_resumes() {
        let outcome = classify(&http(403, "bucket.oss-cn-hangzhou.aliyuncs.com"), false);
        assert_eq!(
            outcome,
            Outcome::Recover {
                action: Recovery::Resume,
                message: "403 denied".into()
            }
        );
        assert!(matches!(
            classify(&http(403, "cn.aliyundrive.net"), false),
            Outcome::Recover { action: Recovery::Resume, .. }
        ));
    }

    #[test]
    fn test_other_http_errors_are_fatal() {
        assert_eq!(
            classify(&http(403, "example.com"), false),
            Outcome::Fatal("403 denied".into())
        );
        assert_eq!(
            classify(&http(404, "bucket.aliyuncs.com"), false),
            Outcome::Fatal("404 denied".into())
        );
    }

    #[test]
    fn test_fixed_messages() {
        let timeout = EngineError::HttpConnection {
            timeout: true,
            message: None,
        };
        assert_eq!(classify(&timeout, false), Outcome::Fatal("Connection Timeout".into()));

        let missing = EngineError::File {
            not_found: true,
            message: Some("ENOENT".into()),
        };
        assert_eq!(classify(&missing, false), Outcome::Fatal("This File is Not Found".into()));

        assert_eq!(
            classify(&EngineError::UnrecognizedFormat, false),
            Outcome::Fatal(UNRECOGNIZED_FORMAT.into())
        );
        assert_eq!(
            classify(&EngineError::Other { message: None }, false),
            Outcome::Fatal("Unknown Error".into())
        );
    }

    #[test]
    fn test_transient_errors_recover() {
        let decoder = EngineError::Decoder {
            track: TrackKind::Audio,
            message: Some("dts not supported".into()),
        };
        assert_eq!(
            classify(&decoder, false),
            Outcome::Recover {
                action: Recovery::DisableTrack(TrackKind::Audio),
                message: "dts not supported".into()
            }
        );

        let live = EngineError::BehindLiveWindow { message: None };
        assert!(matches!(
            classify(&live, false),
            Outcome::Recover { action: Recovery::Restart, .. }
        ));
    }

    #[test]
    fn test_loader_illegal_state_skips_only_with_next_item() {
        let error = EngineError::Loader {
            cause: LoaderCause::IllegalState(Some("bad segment".into())),
            message: None,
        };
        assert!(matches!(
            classify(&error, true),
            Outcome::Recover { action: Recovery::SkipToNext, .. }
        ));
        assert_eq!(classify(&error, false), Outcome::Fatal("bad segment".into()));
    }

    #[test]
    fn test_retry_scope() {
        assert!(Recovery::Resume.retries_item());
        assert!(Recovery::Restart.retries_item());
        assert!(!Recovery::SkipToNext.retries_item());
    }
}
