use std::time::Duration;

use fw_ai::answer::AnswerResult;
use fw_core::error::AppError;

use crate::http::{AskRequest, ErrorBody};

const ASK_TIMEOUT: Duration = Duration::from_secs(60);

/// POST a question to a running `finwiser serve` at `api_url`
/// (e.g. `http://localhost:8000/ask`).
pub fn ask_remote(api_url: &str, question: &str) -> Result<AnswerResult, AppError> {
    let resp = ureq::post(api_url)
        .timeout(ASK_TIMEOUT)
        .send_json(AskRequest {
            question: question.to_string(),
        });

    match resp {
        Ok(r) => r.into_json::<AnswerResult>().map_err(|e| {
            AppError::new("API_RESPONSE_INVALID", "Failed to decode answer")
                .with_details(format!("url={api_url}; err={e}"))
        }),
        Err(ureq::Error::Status(code, r)) => {
            let body = r.into_string().unwrap_or_default();
            let err = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(b) => AppError::new(b.code, b.message).with_details(format!(
                    "status={code}; {}",
                    b.details.unwrap_or_default()
                )),
                Err(_) => AppError::new("API_ERROR", format!("API error {code}")).with_details(body),
            };
            Err(err.with_retryable(code >= 500))
        }
        Err(e) => Err(AppError::new("API_UNREACHABLE", "Could not connect to the FinWiser API")
            .with_details(format!("url={api_url}; err={e}"))
            .with_retryable(true)),
    }
}
