mod clock;
mod error;
mod functions;
mod traits;
mod types;
mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, ProviderError, StoreError};
pub use functions::{
    calculate_expiry, code_challenge_s256, constant_time_eq, display_name, generate_code_verifier,
    generate_session_id, generate_url_safe_token, is_params_expired, is_session_expired,
    params_expires_at, PARAMS_TTL_SECS,
};
pub use traits::{
    AuthorizationProvider, IdentityRepository, LoginProvider, ParamsRepository, ProviderResult,
    Result, SessionRepository, StoreResult, UserRepository,
};
pub use types::{
    AuthorizationRequest, Identity, Params, ProviderClaims, ProviderId, Session, SessionId, User,
    UserId,
};
pub use validation::{parse_bearer, validate_callback_param, MAX_CODE_LEN, MAX_STATE_LEN};
