//! Simulated plant used as the default set of adapters
//!
//! Produces random machine readings, a naive risk score, threshold anomalies
//! and maintenance tickets, and pushes each result through the gateway. The
//! numbers only need to look plausible on a dashboard.

use crate::adapters::{AnomalyMonitor, Predictor, SensorGenerator, SensorLogRef, TicketJob};
use crate::error::AdapterResult;
use crate::gateway::Gateway;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MAX_TEMPERATURE_DELTA_K: f64 = 12.0;
const MAX_TORQUE_NM: f64 = 65.0;
const MAX_TOOL_WEAR_MIN: u32 = 220;

/// One simulated sensor log
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub log_id: String,
    pub machine_id: String,
    pub air_temperature_k: f64,
    pub process_temperature_k: f64,
    pub rotational_speed_rpm: u32,
    pub torque_nm: f64,
    pub tool_wear_min: u32,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl SensorReading {
    fn anomaly_reason(&self) -> Option<&'static str> {
        if self.process_temperature_k - self.air_temperature_k > MAX_TEMPERATURE_DELTA_K {
            Some("heat dissipation")
        } else if self.torque_nm > MAX_TORQUE_NM {
            Some("overstrain")
        } else if self.tool_wear_min > MAX_TOOL_WEAR_MIN {
            Some("tool wear")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Prediction {
    machine_id: String,
    failure_risk: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Anomaly {
    machine_id: String,
    reason: &'static str,
    log_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct Ticket {
    id: u64,
    machine_id: String,
    reason: &'static str,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct PlantState {
    readings: BTreeMap<String, SensorReading>,
    flagged: BTreeMap<String, Anomaly>,
    ticketed: BTreeSet<String>,
    tool_wear: BTreeMap<String, u32>,
    next_log: u64,
    next_ticket: u64,
}

/// Simulated plant implementing every adapter role
pub struct PlantSimulation {
    machines: Vec<String>,
    state: Arc<RwLock<PlantState>>,
    gateway: Arc<Gateway>,
    ticket_interval: Duration,
}

impl PlantSimulation {
    pub fn new(machine_count: usize, gateway: Arc<Gateway>, ticket_interval: Duration) -> Self {
        Self {
            machines: (1..=machine_count).map(|n| format!("M-{:03}", n)).collect(),
            state: Arc::new(RwLock::new(PlantState::default())),
            gateway,
            ticket_interval,
        }
    }

    async fn record(&self, readings: &[SensorReading]) {
        let mut state = self.state.write().await;
        for reading in readings {
            state
                .tool_wear
                .insert(reading.machine_id.clone(), reading.tool_wear_min);
            state
                .readings
                .insert(reading.machine_id.clone(), reading.clone());
        }
    }
}

fn failure_risk(reading: &SensorReading) -> f64 {
    let heat =
        (reading.process_temperature_k - reading.air_temperature_k) / MAX_TEMPERATURE_DELTA_K;
    let strain = reading.torque_nm / MAX_TORQUE_NM;
    let wear = f64::from(reading.tool_wear_min) / f64::from(MAX_TOOL_WEAR_MIN);
    ((heat + strain + wear) / 3.0).clamp(0.0, 1.0)
}

/// Turn every flagged machine without a ticket into one
async fn open_tickets(state: &RwLock<PlantState>, gateway: &Gateway) -> usize {
    let tickets: Vec<Ticket> = {
        let mut state = state.write().await;
        let pending: Vec<Anomaly> = state
            .flagged
            .values()
            .filter(|anomaly| !state.ticketed.contains(&anomaly.machine_id))
            .cloned()
            .collect();

        pending
            .into_iter()
            .map(|anomaly| {
                state.next_ticket += 1;
                state.ticketed.insert(anomaly.machine_id.clone());
                Ticket {
                    id: state.next_ticket,
                    machine_id: anomaly.machine_id,
                    reason: anomaly.reason,
                    created_at: chrono::Utc::now(),
                }
            })
            .collect()
    };

    for ticket in &tickets {
        tracing::info!(
            machine_id = %ticket.machine_id,
            ticket_id = ticket.id,
            "Maintenance ticket opened"
        );
        gateway.emit("ticket:created", ticket).await;
    }
    tickets.len()
}

#[async_trait]
impl SensorGenerator for PlantSimulation {
    async fn generate_all(&self) -> AdapterResult<Vec<SensorLogRef>> {
        let (first_log, wear) = {
            let mut state = self.state.write().await;
            let first = state.next_log;
            state.next_log += self.machines.len() as u64;
            (first, state.tool_wear.clone())
        };

        let mut rng = rand::rngs::StdRng::from_entropy();
        let now = chrono::Utc::now();
        let readings: Vec<SensorReading> = self
            .machines
            .iter()
            .zip(first_log + 1..)
            .map(|(machine_id, log_number)| {
                let air = rng.gen_range(295.0..304.0);
                let tool_wear = wear.get(machine_id).copied().unwrap_or(0) + rng.gen_range(0..6);
                SensorReading {
                    log_id: format!("log-{}", log_number),
                    machine_id: machine_id.clone(),
                    air_temperature_k: air,
                    process_temperature_k: air + rng.gen_range(8.0..13.0),
                    rotational_speed_rpm: rng.gen_range(1200..2800),
                    torque_nm: rng.gen_range(20.0..70.0),
                    tool_wear_min: tool_wear % (MAX_TOOL_WEAR_MIN + 30),
                    recorded_at: now,
                }
            })
            .collect();

        self.record(&readings).await;
        self.gateway.emit("sensor:update", &readings).await;

        Ok(readings
            .into_iter()
            .map(|reading| SensorLogRef {
                id: reading.log_id,
                machine_id: reading.machine_id,
            })
            .collect())
    }
}

#[async_trait]
impl Predictor for PlantSimulation {
    async fn predict_all(&self) -> AdapterResult<usize> {
        let predictions: Vec<Prediction> = {
            let state = self.state.read().await;
            state
                .readings
                .values()
                .map(|reading| Prediction {
                    machine_id: reading.machine_id.clone(),
                    failure_risk: failure_risk(reading),
                })
                .collect()
        };

        if !predictions.is_empty() {
            self.gateway.emit("prediction:update", &predictions).await;
        }
        Ok(predictions.len())
    }
}

#[async_trait]
impl AnomalyMonitor for PlantSimulation {
    async fn scan_all(&self) -> AdapterResult<usize> {
        let detected: Vec<Anomaly> = {
            let mut state = self.state.write().await;
            let readings: Vec<SensorReading> = state.readings.values().cloned().collect();
            let mut detected = Vec::new();

            for reading in readings {
                match reading.anomaly_reason() {
                    Some(reason) => {
                        let anomaly = Anomaly {
                            machine_id: reading.machine_id.clone(),
                            reason,
                            log_id: reading.log_id.clone(),
                        };
                        if state
                            .flagged
                            .insert(reading.machine_id.clone(), anomaly.clone())
                            .is_none()
                        {
                            detected.push(anomaly);
                        }
                    }
                    None => {
                        state.flagged.remove(&reading.machine_id);
                        state.ticketed.remove(&reading.machine_id);
                    }
                }
            }
            detected
        };

        for anomaly in &detected {
            self.gateway.emit("anomaly:detected", anomaly).await;
        }
        Ok(detected.len())
    }
}

#[async_trait]
impl TicketJob for PlantSimulation {
    async fn register(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> AdapterResult<Option<JoinHandle<()>>> {
        let state = self.state.clone();
        let gateway = self.gateway.clone();
        let period = self.ticket_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let opened = open_tickets(&state, &gateway).await;
                        if opened > 0 {
                            tracing::info!(count = opened, "[TICKET] Opened {} tickets", opened);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(interval_ms = period.as_millis() as u64, "Auto ticket job registered");
        Ok(Some(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TokenVerifier;

    fn plant(machines: usize) -> PlantSimulation {
        let gateway = Arc::new(Gateway::new(TokenVerifier::reject_all()));
        PlantSimulation::new(machines, gateway, Duration::from_millis(1000))
    }

    fn reading(machine_id: &str, torque_nm: f64) -> SensorReading {
        SensorReading {
            log_id: format!("log-{}", machine_id),
            machine_id: machine_id.to_string(),
            air_temperature_k: 300.0,
            process_temperature_k: 310.0,
            rotational_speed_rpm: 1500,
            torque_nm,
            tool_wear_min: 10,
            recorded_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_generate_inserts_one_log_per_machine() {
        let plant = plant(4);
        let logs = plant.generate_all().await.unwrap();
        assert_eq!(logs.len(), 4);
        assert_eq!(logs[0].machine_id, "M-001");

        let next = plant.generate_all().await.unwrap();
        assert_ne!(logs[0].id, next[0].id);
    }

    #[tokio::test]
    async fn test_predict_counts_machines_with_readings() {
        let plant = plant(3);
        assert_eq!(plant.predict_all().await.unwrap(), 0);

        plant.generate_all().await.unwrap();
        assert_eq!(plant.predict_all().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_anomaly_is_reported_once_until_cleared() {
        let plant = plant(2);
        plant
            .record(&[reading("M-001", 80.0), reading("M-002", 30.0)])
            .await;

        assert_eq!(plant.scan_all().await.unwrap(), 1);
        assert_eq!(plant.scan_all().await.unwrap(), 0);

        plant.record(&[reading("M-001", 30.0)]).await;
        assert_eq!(plant.scan_all().await.unwrap(), 0);
        plant.record(&[reading("M-001", 80.0)]).await;
        assert_eq!(plant.scan_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tickets_open_once_per_flagged_machine() {
        let plant = plant(1);
        plant.record(&[reading("M-001", 80.0)]).await;
        plant.scan_all().await.unwrap();

        assert_eq!(open_tickets(&plant.state, &plant.gateway).await, 1);
        assert_eq!(open_tickets(&plant.state, &plant.gateway).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registered_ticket_job_runs_until_shutdown() {
        let plant = plant(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = plant.register(shutdown_rx).await.unwrap().unwrap();

        plant.record(&[reading("M-001", 80.0)]).await;
        plant.scan_all().await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(plant.state.read().await.next_ticket, 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_failure_risk_is_bounded() {
        assert!(failure_risk(&reading("M-001", 500.0)) <= 1.0);
        assert!(failure_risk(&reading("M-001", 0.0)) >= 0.0);
    }
}
