/*!
Parse function enregistreuse pour tests sans vrais plugins

Enregistre chaque appel (lignes reçues, préfixe d'item state actif) et
renvoie un résultat configurable : écho des lignes, valeur fixe, null,
signal "not ready", échec ou panique.
*/

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use symbion_sections::{AgentRow, ItemStatePrefix, ParseOutcome, RunContext};

/// Comportement de la parse function simulée
#[derive(Debug, Clone)]
pub enum StubBehaviour {
    /// Renvoie les lignes reçues en JSON (tableau de tableaux)
    Echo,
    /// Renvoie toujours la même valeur
    Constant(Value),
    /// Renvoie null (rien d'exploitable)
    Null,
    /// Pas encore assez d'historique
    NotReady,
    /// Échec avec ce message
    Fail(String),
    /// Panique avec ce message
    Panic(String),
}

/// Un appel enregistré
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub rows: Vec<AgentRow>,
    pub item_state_prefix: Option<ItemStatePrefix>,
}

/// Parse function simulée qui garde la trace de ses appels
#[derive(Clone)]
pub struct RecordingParser {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    behaviour: Arc<Mutex<StubBehaviour>>,
}

impl RecordingParser {
    pub fn new(behaviour: StubBehaviour) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            behaviour: Arc::new(Mutex::new(behaviour)),
        }
    }

    pub fn echo() -> Self {
        Self::new(StubBehaviour::Echo)
    }

    /// Change le comportement pour les appels suivants
    pub fn set_behaviour(&self, behaviour: StubBehaviour) {
        *self.behaviour.lock() = behaviour;
    }

    /// La closure à brancher dans un SectionPlugin ou une table legacy
    pub fn parse_function(&self) -> impl Fn(&[AgentRow], &RunContext) -> ParseOutcome + Send + Sync + 'static {
        let recorder = self.clone();
        move |rows: &[AgentRow], context: &RunContext| recorder.parse(rows, context)
    }

    fn parse(&self, rows: &[AgentRow], context: &RunContext) -> ParseOutcome {
        self.calls.lock().push(RecordedCall {
            rows: rows.to_vec(),
            item_state_prefix: context.item_state_prefix(),
        });

        let behaviour = self.behaviour.lock().clone();
        match behaviour {
            StubBehaviour::Echo => ParseOutcome::Parsed(serde_json::json!(rows)),
            StubBehaviour::Constant(value) => ParseOutcome::Parsed(value),
            StubBehaviour::Null => ParseOutcome::null(),
            StubBehaviour::NotReady => ParseOutcome::NotReady,
            StubBehaviour::Fail(message) => ParseOutcome::Failed(anyhow::anyhow!(message)),
            StubBehaviour::Panic(message) => panic!("{message}"),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Lignes reçues lors du dernier appel
    pub fn last_rows(&self) -> Option<Vec<AgentRow>> {
        self.calls.lock().last().map(|call| call.rows.clone())
    }

    /// Reset des appels enregistrés
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Default for RecordingParser {
    fn default() -> Self {
        Self::echo()
    }
}
