//! Startup and authentication (spec §4.7 ambient addition). Grounded in the
//! teacher's `postgres/connection/establish.rs` and `postgres/connection/
//! auth.rs`: the handshake is ordinary pipeline traffic, not a special case,
//! so it is expressed as a couple of `Request`s threaded through a
//! [`Session`](crate::Session) rather than a bespoke connect routine.

use bytes::Bytes;

use crate::error::{BackendError, Error};
use crate::io::BufMutExt;
use crate::message::backend::{Authentication, BackendKeyData, ReadyForQuery};
use crate::message::frontend::{CancelRequest, PasswordMessage, StartupMessage};
use crate::message::{BackendTag, Decode, Encode};
use crate::parser::{is_transparent, ParseStep, ResponseParser};
use crate::request::Request;
use crate::session::Session;
use crate::settings::Settings;

/// Encodes `StartupMessage` for a fresh connection. `extra_params` supplies
/// anything beyond `user`/`database` (e.g. `application_name`); `user` and
/// `database` are pulled out of `settings` when it carries structured
/// fields, or must be supplied by `extra_params` when `settings` is
/// [`Settings::Raw`] (the core does not parse connection strings, spec §1).
pub fn encode_startup(settings: &Settings, extra_params: &[(&str, &str)]) -> Vec<u8> {
    let mut owned = Vec::new();

    if let Settings::Fields(fields) = settings {
        if !fields.user.is_empty() {
            owned.push(("user", fields.user.as_str()));
        }
        if !fields.database.is_empty() {
            owned.push(("database", fields.database.as_str()));
        }
    }
    owned.extend_from_slice(extra_params);

    let mut buf = Vec::new();
    StartupMessage { params: &owned }.encode(&mut buf);
    buf
}

/// Encodes the out-of-band `CancelRequest` for a fresh, throwaway
/// connection (spec §6 ambient addition). Not part of the five-loop
/// pipeline — the caller sends this over its own socket and then closes it.
pub fn encode_cancel_request(process_id: i32, secret_key: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    CancelRequest {
        process_id,
        secret_key,
    }
    .encode(&mut buf);
    buf
}

/// Builds the cleartext `PasswordMessage` response.
pub fn encode_cleartext_password(password: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    PasswordMessage(password).encode(&mut buf);
    buf
}

/// Builds the MD5 `PasswordMessage` response: `"md5" + hex(md5(hex(md5(password
/// + user)) ... )`, per the v3 protocol's two-round digest salted by the
/// four bytes the server sent in `AuthenticationMD5Password`.
#[cfg(feature = "md5-auth")]
pub fn encode_md5_password(user: &str, password: &str, salt: [u8; 4]) -> Vec<u8> {
    use md5::{Digest, Md5};

    let mut inner = Md5::new();
    inner.update(password.as_bytes());
    inner.update(user.as_bytes());
    let inner_hex = hex::encode(inner.finalize());

    let mut outer = Md5::new();
    outer.update(inner_hex.as_bytes());
    outer.update(salt);
    let response = format!("md5{}", hex::encode(outer.finalize()));

    encode_cleartext_password(&response)
}

/// A password response the caller must send before the handshake can
/// continue.
#[derive(Debug)]
pub enum AuthRequest {
    Cleartext,
    Md5 { salt: [u8; 4] },
}

/// Fully negotiated connection state once the handshake completes.
#[derive(Debug)]
pub struct StartupInfo {
    pub process_id: i32,
    pub secret_key: i32,
    pub parameters: Vec<(String, String)>,
}

/// What a completed handshake stage settled on: either the server demands a
/// password before it will go on, or authentication is already finished and
/// the rest of the burst (`ParameterStatus*`/`BackendKeyData`/
/// `ReadyForQuery`) has been collected.
enum HandshakeOutcome {
    NeedsPassword(AuthRequest),
    Ready(StartupInfo),
}

/// Accumulates `ParameterStatus*`, then `BackendKeyData`, then completes on
/// `ReadyForQuery` — the unsolicited burst the server sends once
/// authentication is settled, with no client message separating any of it
/// (spec §4.7 ambient addition; grounded in the teacher's `establish.rs`,
/// which consumes this whole burst in one `loop` over `stream.recv()`
/// rather than splitting it across requests).
struct CollectStartupInfo {
    parameters: Vec<(String, String)>,
    process_id: i32,
    secret_key: i32,
    seen_backend_key_data: bool,
}

impl CollectStartupInfo {
    fn new() -> Self {
        Self {
            parameters: Vec::new(),
            process_id: 0,
            secret_key: 0,
            seen_backend_key_data: false,
        }
    }

    /// `Ok(None)` means "keep going"; `Ok(Some(_))`/`Err(_)` are terminal.
    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Result<StartupInfo, BackendError>> {
        match tag {
            BackendTag::ParameterStatus => {
                match crate::message::backend::ParameterStatus::decode(payload) {
                    Ok(ps) => {
                        self.parameters.push((ps.name, ps.value));
                        ParseStep::NeedMore
                    }
                    Err(e) => ParseStep::Fail(e.to_string()),
                }
            }
            BackendTag::NoticeResponse => ParseStep::NeedMore,
            BackendTag::BackendKeyData => match BackendKeyData::decode(payload) {
                Ok(bkd) => {
                    self.process_id = bkd.process_id;
                    self.secret_key = bkd.secret_key;
                    self.seen_backend_key_data = true;
                    ParseStep::NeedMore
                }
                Err(e) => ParseStep::Fail(e.to_string()),
            },
            BackendTag::ReadyForQuery => match ReadyForQuery::decode(payload) {
                Ok(_) if self.seen_backend_key_data => ParseStep::Done(Ok(StartupInfo {
                    process_id: self.process_id,
                    secret_key: self.secret_key,
                    parameters: std::mem::take(&mut self.parameters),
                })),
                Ok(_) => ParseStep::Fail("ReadyForQuery before BackendKeyData".into()),
                Err(e) => ParseStep::Fail(e.to_string()),
            },
            BackendTag::ErrorResponse => {
                match crate::message::backend::Response::decode(payload)
                    .and_then(crate::message::backend::Response::into_backend_error)
                {
                    Ok(err) => ParseStep::Done(Err(err)),
                    Err(e) => ParseStep::Fail(e.to_string()),
                }
            }
            other => ParseStep::Fail(format!("unexpected message during startup: {other:?}")),
        }
    }
}

/// The response to `StartupMessage`: `AuthenticationRequest` variants until
/// one is settled, and if it settles on `AuthenticationOk` directly (no
/// password needed), the trailing `ParameterStatus*`/`BackendKeyData`/
/// `ReadyForQuery` burst too — all as *one* pipeline stage, since the server
/// never waits for a client message in between. Only when the server
/// demands a password does this stage end early, so the session can send
/// `PasswordMessage` as its own `Request` (see [`PasswordResponse`]).
enum StartupResponse {
    AwaitingAuth,
    Collecting(CollectStartupInfo),
}

impl StartupResponse {
    fn new() -> Self {
        StartupResponse::AwaitingAuth
    }
}

impl ResponseParser for StartupResponse {
    type Output = Result<HandshakeOutcome, BackendError>;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        match self {
            StartupResponse::AwaitingAuth => {
                if is_transparent(tag) {
                    return ParseStep::NeedMore;
                }

                match tag {
                    BackendTag::Authentication => match Authentication::decode(payload) {
                        Ok(Authentication::Ok) => {
                            *self = StartupResponse::Collecting(CollectStartupInfo::new());
                            ParseStep::NeedMore
                        }
                        Ok(Authentication::CleartextPassword) => ParseStep::Done(Ok(
                            HandshakeOutcome::NeedsPassword(AuthRequest::Cleartext),
                        )),
                        Ok(Authentication::Md5Password { salt }) => ParseStep::Done(Ok(
                            HandshakeOutcome::NeedsPassword(AuthRequest::Md5 { salt }),
                        )),
                        Ok(other) => {
                            ParseStep::Fail(format!("unsupported auth method: {other:?}"))
                        }
                        Err(e) => ParseStep::Fail(e.to_string()),
                    },
                    BackendTag::ErrorResponse => {
                        match crate::message::backend::Response::decode(payload)
                            .and_then(crate::message::backend::Response::into_backend_error)
                        {
                            Ok(err) => ParseStep::Done(Err(err)),
                            Err(e) => ParseStep::Fail(e.to_string()),
                        }
                    }
                    other => ParseStep::Fail(format!("expected Authentication, got {other:?}")),
                }
            }
            StartupResponse::Collecting(collector) => match collector.feed(tag, payload) {
                ParseStep::NeedMore => ParseStep::NeedMore,
                ParseStep::Done(Ok(info)) => ParseStep::Done(Ok(HandshakeOutcome::Ready(info))),
                ParseStep::Done(Err(e)) => ParseStep::Done(Err(e)),
                ParseStep::Fail(e) => ParseStep::Fail(e),
            },
        }
    }
}

/// The response to a `PasswordMessage`: `AuthenticationOk` followed
/// immediately by the same unsolicited `ParameterStatus*`/`BackendKeyData`/
/// `ReadyForQuery` burst `StartupResponse` collects when no password is
/// needed — again, one stage, not two, since nothing separates them on the
/// wire.
enum PasswordResponse {
    AwaitingOk,
    Collecting(CollectStartupInfo),
}

impl PasswordResponse {
    fn new() -> Self {
        PasswordResponse::AwaitingOk
    }
}

impl ResponseParser for PasswordResponse {
    type Output = Result<StartupInfo, BackendError>;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        match self {
            PasswordResponse::AwaitingOk => {
                if is_transparent(tag) {
                    return ParseStep::NeedMore;
                }

                match tag {
                    BackendTag::Authentication => match Authentication::decode(payload) {
                        Ok(Authentication::Ok) => {
                            *self = PasswordResponse::Collecting(CollectStartupInfo::new());
                            ParseStep::NeedMore
                        }
                        Ok(other) => {
                            ParseStep::Fail(format!("expected AuthenticationOk, got {other:?}"))
                        }
                        Err(e) => ParseStep::Fail(e.to_string()),
                    },
                    BackendTag::ErrorResponse => {
                        match crate::message::backend::Response::decode(payload)
                            .and_then(crate::message::backend::Response::into_backend_error)
                        {
                            Ok(err) => ParseStep::Done(Err(err)),
                            Err(e) => ParseStep::Fail(e.to_string()),
                        }
                    }
                    other => {
                        ParseStep::Fail(format!("expected AuthenticationOk, got {other:?}"))
                    }
                }
            }
            PasswordResponse::Collecting(collector) => collector.feed(tag, payload),
        }
    }
}

/// Builds the session that runs the whole handshake: `StartupMessage`, then
/// — only if the server demands one — a password round-trip, then in either
/// case the trailing `ParameterStatus*`/`BackendKeyData`/`ReadyForQuery`
/// burst consumed as part of whichever stage's response it immediately
/// follows. Only `password` is supplied by the caller (credential
/// resolution stays external per spec §1); everything else is driven here.
pub fn startup_session(
    settings: Settings,
    extra_params: Vec<(String, String)>,
    password: Option<String>,
) -> Session<Result<StartupInfo, Error>> {
    let extra_params_refs: Vec<(&str, &str)> = extra_params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let startup_bytes = encode_startup(&settings, &extra_params_refs);

    let user = match &settings {
        Settings::Fields(f) => f.user.clone(),
        Settings::Raw(_) => String::new(),
    };

    let startup_request = Request::new(
        move |buf: &mut Vec<u8>| buf.put_bytes(&startup_bytes),
        StartupResponse::new(),
    );

    Session::free(startup_request, move |outcome| match outcome {
        Err(e) => Session::pure(Err(e)),
        Ok(Err(backend_err)) => Session::pure(Err(Error::Backend(backend_err))),
        Ok(Ok(HandshakeOutcome::Ready(info))) => Session::pure(Ok(info)),
        Ok(Ok(HandshakeOutcome::NeedsPassword(AuthRequest::Cleartext))) => {
            let Some(password) = password.clone() else {
                return Session::pure(Err(Error::protocol(
                    "server requested a cleartext password but none was supplied",
                )));
            };
            let bytes = encode_cleartext_password(&password);
            send_password_then_continue(bytes)
        }
        #[cfg(feature = "md5-auth")]
        Ok(Ok(HandshakeOutcome::NeedsPassword(AuthRequest::Md5 { salt }))) => {
            let Some(password) = password.clone() else {
                return Session::pure(Err(Error::protocol(
                    "server requested an md5 password but none was supplied",
                )));
            };
            let bytes = encode_md5_password(&user, &password, salt);
            send_password_then_continue(bytes)
        }
        #[cfg(not(feature = "md5-auth"))]
        Ok(Ok(HandshakeOutcome::NeedsPassword(AuthRequest::Md5 { .. }))) => {
            Session::pure(Err(Error::protocol(
                "server requested md5 authentication but the md5-auth feature is disabled",
            )))
        }
    })
}

fn send_password_then_continue(bytes: Vec<u8>) -> Session<Result<StartupInfo, Error>> {
    let request = Request::new(
        move |buf: &mut Vec<u8>| buf.put_bytes(&bytes),
        PasswordResponse::new(),
    );

    Session::free(request, |outcome| match outcome {
        Err(e) => Session::pure(Err(e)),
        Ok(Err(backend_err)) => Session::pure(Err(Error::Backend(backend_err))),
        Ok(Ok(info)) => Session::pure(Ok(info)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConnectionFields;

    #[test]
    fn startup_message_contains_user_and_database() {
        let settings = Settings::Fields(ConnectionFields {
            host: "localhost".into(),
            port: 5432,
            user: "app".into(),
            password: String::new(),
            database: "app_db".into(),
        });

        let buf = encode_startup(&settings, &[("application_name", "pgwire-dispatch")]);
        let s = String::from_utf8_lossy(&buf);
        assert!(s.contains("user\0app\0"));
        assert!(s.contains("database\0app_db\0"));
        assert!(s.contains("application_name\0pgwire-dispatch\0"));
    }

    #[test]
    fn cancel_request_has_fixed_length_and_code() {
        let buf = encode_cancel_request(1234, 5678);
        assert_eq!(&buf[0..4], &16i32.to_be_bytes());
        assert_eq!(&buf[4..8], &((1234i32 << 16) | 5678).to_be_bytes());
    }

    fn authentication_ok_bytes() -> Bytes {
        Bytes::from(0i32.to_be_bytes().to_vec())
    }

    fn backend_key_data_bytes(process_id: i32, secret_key: i32) -> Bytes {
        let mut buf = Vec::new();
        buf.extend_from_slice(&process_id.to_be_bytes());
        buf.extend_from_slice(&secret_key.to_be_bytes());
        Bytes::from(buf)
    }

    fn ready_for_query_bytes() -> Bytes {
        Bytes::from(vec![b'I'])
    }

    /// The whole unsolicited post-auth burst must be consumed by a single
    /// `StartupResponse` instance, not split across separately-admitted
    /// requests — `BackendKeyData` arrives with nothing from the client in
    /// between, so a second stage would never see it.
    #[test]
    fn startup_response_consumes_auth_ok_through_ready_for_query_in_one_stage() {
        let mut p = StartupResponse::new();

        assert!(matches!(
            p.feed(BackendTag::Authentication, authentication_ok_bytes()),
            ParseStep::NeedMore
        ));
        assert!(matches!(
            p.feed(BackendTag::BackendKeyData, backend_key_data_bytes(42, 99)),
            ParseStep::NeedMore
        ));

        match p.feed(BackendTag::ReadyForQuery, ready_for_query_bytes()) {
            ParseStep::Done(Ok(HandshakeOutcome::Ready(info))) => {
                assert_eq!(info.process_id, 42);
                assert_eq!(info.secret_key, 99);
            }
            _ => panic!("expected Done(Ok(Ready(..)))"),
        }
    }

    #[test]
    fn startup_response_ends_early_on_cleartext_password_request() {
        let mut p = StartupResponse::new();
        let buf = Bytes::from(3i32.to_be_bytes().to_vec());

        match p.feed(BackendTag::Authentication, buf) {
            ParseStep::Done(Ok(HandshakeOutcome::NeedsPassword(AuthRequest::Cleartext))) => {}
            _ => panic!("expected NeedsPassword(Cleartext)"),
        }
    }

    /// After the password round trip, `AuthenticationOk` and the trailing
    /// burst are likewise one stage.
    #[test]
    fn password_response_consumes_auth_ok_through_ready_for_query_in_one_stage() {
        let mut p = PasswordResponse::new();

        assert!(matches!(
            p.feed(BackendTag::Authentication, authentication_ok_bytes()),
            ParseStep::NeedMore
        ));
        assert!(matches!(
            p.feed(BackendTag::BackendKeyData, backend_key_data_bytes(7, 8)),
            ParseStep::NeedMore
        ));

        match p.feed(BackendTag::ReadyForQuery, ready_for_query_bytes()) {
            ParseStep::Done(Ok(info)) => {
                assert_eq!(info.process_id, 7);
                assert_eq!(info.secret_key, 8);
            }
            _ => panic!("expected Done(Ok(..))"),
        }
    }
}
