// Recommendation use case - Prompt payload and reply parsing for the maintenance advisor
use crate::domain::hint::TelemetryHint;
use crate::domain::machine::{MachineOverview, StopEvent, Tier};
use crate::domain::maintenance::AiRecommendation;
use crate::domain::oee::OeePoint;
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

const PREVIEW_ROWS: usize = 12;

pub const SYSTEM_INSTRUCTIONS: &str = "You are a reliability engineer and OEE analyst.
You receive JSON with the machine state, an OEE preview, stop events and telemetry_hint.

Rules:
- Base the diagnosis on telemetry_hint.last, telemetry_hint.max, telemetry_hint.alarms and thresholds.
- If telemetry_hint.status is NO_DATA or DISABLED, draw no conclusions from sensors and say there is no data.
- Never invent numbers. If a figure is missing, write \"-\" and explain.
- If telemetry_hint.economics.estimated_loss is present, use that figure in cost_impact.
- Use only the economics values given in the input; do not recompute them or invent currency or margin.
- Reply with strict JSON (no markdown) following output_format.";

#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub level: Tier,
    pub machine: MachineOverview,
    pub oee: Vec<OeePoint>,
    pub stops: Vec<StopEvent>,
    pub telemetry_hint: TelemetryHint,
}

#[async_trait]
pub trait RecommendationClient: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest) -> anyhow::Result<AiRecommendation>;
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,
    #[error("reply is not a valid recommendation: {0}")]
    Invalid(#[from] serde_json::Error),
}

pub fn build_input_payload(request: &RecommendationRequest) -> Value {
    json!({
        "level": request.level,
        "machine": request.machine,
        "oee_timeseries_preview": oee_preview(&request.oee),
        "stops_preview": stops_preview(&request.stops),
        "telemetry_hint": request.telemetry_hint,
        "goal": "Give a STOP/CONTINUE/MONITOR decision, a risk level and concrete steps (maintenance, repair, spare parts, plan).",
        "output_format": {
            "decision": "STOP|CONTINUE|MONITOR",
            "risk": "LOW|MEDIUM|HIGH",
            "diagnosis": "string",
            "rationale": "string",
            "actions": [{"title": "string", "details": "string|null"}],
            "cost_impact": "string|null",
            "next_check": "string|null",
        },
    })
}

/// Last points of the OEE trend in time order.
fn oee_preview(points: &[OeePoint]) -> Vec<Value> {
    let mut sorted: Vec<&OeePoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);
    let skip = sorted.len().saturating_sub(PREVIEW_ROWS);

    sorted
        .into_iter()
        .skip(skip)
        .map(|p| json!({"timestamp": p.timestamp, "oee_percent": p.oee_percent}))
        .collect()
}

/// Most recent stops first.
fn stops_preview(stops: &[StopEvent]) -> Vec<Value> {
    let mut sorted: Vec<&StopEvent> = stops.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));

    sorted
        .into_iter()
        .take(PREVIEW_ROWS)
        .map(|s| {
            json!({
                "start": s.start,
                "end": s.end,
                "reason": s.reason,
                "duration_min": s.duration_min(),
                "note": s.note,
            })
        })
        .collect()
}

/// Parse the model's reply, falling back to the outermost braces when the
/// JSON is wrapped in prose or markdown.
pub fn parse_recommendation(text: &str) -> Result<AiRecommendation, ReplyError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ReplyError::Empty);
    }

    match serde_json::from_str(text) {
        Ok(recommendation) => Ok(recommendation),
        Err(err) => match (text.find('{'), text.rfind('}')) {
            (Some(l), Some(r)) if r > l => Ok(serde_json::from_str(&text[l..=r])?),
            _ => Err(err.into()),
        },
    }
}
