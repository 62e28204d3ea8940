use crate::{backend::BackendError, handle::MalformedHandle};
use thiserror::Error;

/// Failure of one provisioning operation.
///
/// Local validation problems are detected before the backend is contacted;
/// everything the backend reports is carried through untouched.
#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error("{0}")]
  InvalidArgument(String),

  #[error("{0}")]
  FailedPrecondition(String),

  #[error(transparent)]
  Backend(#[from] BackendError),
}

impl ProvisionError {
  pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
    ProvisionError::InvalidArgument(message.into())
  }

  pub(crate) fn failed_precondition(message: impl Into<String>) -> Self {
    ProvisionError::FailedPrecondition(message.into())
  }
}

impl From<MalformedHandle> for ProvisionError {
  fn from(value: MalformedHandle) -> Self {
    ProvisionError::InvalidArgument(value.to_string())
  }
}

impl From<ProvisionError> for tonic::Status {
  fn from(value: ProvisionError) -> Self {
    use tonic::{Code, Status};

    match value {
      ProvisionError::InvalidArgument(v) => Status::new(Code::InvalidArgument, v),
      ProvisionError::FailedPrecondition(v) => Status::new(Code::FailedPrecondition, v),
      ProvisionError::Backend(e) => {
        let code = match e {
          BackendError::NotFound(_) => Code::NotFound,
          BackendError::AlreadyExists { .. } => Code::AlreadyExists,
          BackendError::MissingCredentials(_) => Code::InvalidArgument,
          _ => Code::Internal,
        };

        Status::new(code, e.to_string())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;
  use tonic::Code;

  #[test_case(ProvisionError::invalid_argument("bad") => Code::InvalidArgument ; "invalid argument")]
  #[test_case(ProvisionError::failed_precondition("no ns") => Code::FailedPrecondition ; "failed precondition")]
  #[test_case(BackendError::NotFound("tenant".into()).into() => Code::NotFound ; "not found")]
  #[test_case(BackendError::AlreadyExists { id: None }.into() => Code::AlreadyExists ; "already exists")]
  #[test_case(BackendError::MissingCredentials("user").into() => Code::InvalidArgument ; "missing credentials")]
  #[test_case(
    BackendError::Rpc { code: -32603, message: "quota rejected".into() }.into()
    => Code::Internal
    ; "rpc failure")]
  fn grpc_code(error: ProvisionError) -> Code {
    tonic::Status::from(error).code()
  }

  #[test]
  fn backend_message_is_kept() {
    let status = tonic::Status::from(ProvisionError::from(BackendError::Rpc {
      code: 7,
      message: "quota rejected".into(),
    }));

    assert!(status.message().contains("quota rejected"));
  }

  #[test]
  fn malformed_handle_is_invalid_argument() {
    let err = "novolume".parse::<crate::handle::VolumeHandle>().unwrap_err();
    let status = tonic::Status::from(ProvisionError::from(err));
    assert_eq!(status.code(), Code::InvalidArgument);
  }
}
