// What-if economics of stopping a machine
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EconomicsSettings {
    #[serde(default)]
    pub planned_units_per_shift: f64,
    #[serde(default = "default_shift_hours")]
    pub shift_hours: f64,
    #[serde(default)]
    pub margin_per_unit: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_shift_hours() -> f64 {
    8.0
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for EconomicsSettings {
    fn default() -> Self {
        Self {
            planned_units_per_shift: 0.0,
            shift_hours: default_shift_hours(),
            margin_per_unit: 0.0,
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    pub planned_units_per_shift: f64,
    pub shift_hours: f64,
    pub margin_per_unit: f64,
    pub currency: String,
    pub what_if_stop_hours: f64,
    pub units_per_hour: f64,
    pub estimated_loss: f64,
}

impl Economics {
    /// Lost margin if the machine is stopped for `stop_hours`.
    pub fn what_if(settings: &EconomicsSettings, stop_hours: f64) -> Self {
        let units_per_hour = if settings.shift_hours > 0.0 {
            settings.planned_units_per_shift / settings.shift_hours
        } else {
            0.0
        };
        let estimated_loss = units_per_hour * settings.margin_per_unit * stop_hours;

        Self {
            planned_units_per_shift: settings.planned_units_per_shift,
            shift_hours: settings.shift_hours,
            margin_per_unit: settings.margin_per_unit,
            currency: settings.currency.clone(),
            what_if_stop_hours: stop_hours,
            units_per_hour,
            estimated_loss,
        }
    }
}
