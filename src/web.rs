//! Browser form front end served with axum
//!
//! The model artifact is loaded on the first prediction request and shared,
//! read-only, by every later request in the process.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::error::ChurnError;
use crate::model::{ChurnPipeline, Prediction};
use crate::schema::{vocabulary, CustomerRecord, CATEGORICAL_FEATURES};

/// Shared server state: where the artifact lives and the lazily loaded model
pub struct AppState {
    model_path: PathBuf,
    model: OnceLock<Arc<ChurnPipeline>>,
}

impl AppState {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            model: OnceLock::new(),
        }
    }

    /// The cached pipeline, loading it on first use.
    ///
    /// A failed load is not cached, so a later request retries once the
    /// artifact exists.
    pub fn model(&self) -> crate::Result<Arc<ChurnPipeline>> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }
        let loaded = Arc::new(ChurnPipeline::load(&self.model_path)?);
        tracing::info!("Model loaded from {}", self.model_path.display());
        Ok(Arc::clone(self.model.get_or_init(|| loaded)))
    }
}

/// Build the axum [`Router`] with all routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(form_handler))
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve the form until the process is stopped
pub async fn serve(addr: SocketAddr, model_path: PathBuf) -> crate::Result<()> {
    let state = Arc::new(AppState::new(model_path));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving churn prediction form on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn form_handler() -> Html<String> {
    Html(render_page(None, None))
}

async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Form(record): Form<CustomerRecord>,
) -> Response {
    let outcome = match record.validate() {
        Ok(()) => {
            let input = record.clone();
            tokio::task::spawn_blocking(move || {
                state.model().and_then(|model| model.predict(&input))
            })
            .await
        }
        Err(err) => Ok(Err(err)),
    };

    match outcome {
        Ok(Ok(prediction)) => {
            tracing::debug!(
                "Predicted churn={} (p={:.4})",
                prediction.churn,
                prediction.probability
            );
            Html(render_page(Some(&record), Some(Ok(prediction)))).into_response()
        }
        Ok(Err(err)) => {
            let status = match &err {
                err if err.is_model_error() => StatusCode::SERVICE_UNAVAILABLE,
                ChurnError::UnknownCategory { .. } | ChurnError::InvalidInput { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!("Prediction failed: {}", err);
            (status, Html(render_page(Some(&record), Some(Err(err))))).into_response()
        }
        Err(join_error) => {
            tracing::error!("Prediction task failed: {}", join_error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_page(Some(&record), None)),
            )
                .into_response()
        }
    }
}

fn render_page(record: Option<&CustomerRecord>, outcome: Option<crate::Result<Prediction>>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <title>Customer Churn Prediction Tool</title></head><body>\n\
         <h1>Customer Churn Prediction Tool</h1>\n\
         <form method=\"post\" action=\"/predict\">\n<h2>Enter Customer Details</h2>\n",
    );

    for column in CATEGORICAL_FEATURES {
        let options = vocabulary(column).unwrap_or_default();
        let current = record.and_then(|record| record.categorical(column));
        let selected = current.as_deref().unwrap_or_else(|| options.first().copied().unwrap_or(""));
        if options.len() == 2 && column != "gender" {
            render_radios(&mut html, column, options, selected);
        } else {
            render_select(&mut html, column, options, selected);
        }
    }

    let tenure = record.map_or(12, |record| record.tenure);
    let _ = writeln!(
        html,
        "<label>Months with Company <input type=\"range\" name=\"tenure\" \
         min=\"0\" max=\"72\" step=\"1\" value=\"{tenure}\"></label><br>"
    );
    render_number(&mut html, "MonthlyCharges", "Monthly Charges", record.map_or(50.0, |r| r.monthly_charges));
    render_number(&mut html, "TotalCharges", "Total Charges to Date", record.map_or(500.0, |r| r.total_charges));
    html.push_str("<button type=\"submit\">Predict</button>\n</form>\n");

    match outcome {
        Some(Ok(prediction)) => {
            let _ = writeln!(
                html,
                "<h2>Prediction Results</h2>\n<p>The customer will churn: {}</p>\n\
                 <p>Probability of churn: {:.4}</p>",
                prediction.label(),
                prediction.probability
            );
        }
        Some(Err(err)) => {
            let _ = writeln!(html, "<h2>Error</h2>\n<p>{}</p>", escape_html(&err.to_string()));
        }
        None => {}
    }

    html.push_str("</body></html>\n");
    html
}

fn render_select(html: &mut String, column: &str, options: &[&str], selected: &str) {
    let _ = write!(html, "<label>{column} <select name=\"{column}\">");
    for option in options {
        let mark = if *option == selected { " selected" } else { "" };
        let value = escape_html(option);
        let _ = write!(html, "<option value=\"{value}\"{mark}>{value}</option>");
    }
    html.push_str("</select></label><br>\n");
}

fn render_radios(html: &mut String, column: &str, options: &[&str], selected: &str) {
    let _ = write!(html, "<fieldset><legend>{column}</legend>");
    for option in options {
        let mark = if *option == selected { " checked" } else { "" };
        let value = escape_html(option);
        let _ = write!(
            html,
            "<label><input type=\"radio\" name=\"{column}\" value=\"{value}\"{mark}>{value}</label>"
        );
    }
    html.push_str("</fieldset>\n");
}

fn render_number(html: &mut String, name: &str, label: &str, value: f64) {
    let _ = writeln!(
        html,
        "<label>{label} <input type=\"number\" name=\"{name}\" min=\"0\" step=\"0.01\" \
         value=\"{value}\"></label><br>"
    );
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
