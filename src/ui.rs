//! Interface de terminal do tankflow — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`SessionProgress`] acompanha visualmente
//! uma sessão de trabalho do motorista no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::TankflowError;
use crate::workflow::{Phase, TripSummary};

/// Indicador visual de progresso para uma sessão de transporte.
///
/// Exibe um spinner animado com a fase ativa e mensagens coloridas:
/// verde para entregas confirmadas, amarelo para falhas de validação.
pub struct SessionProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para confirmações.
    green: Style,
    // Estilo amarelo para avisos de validação.
    yellow: Style,
}

impl SessionProgress {
    /// Inicia o spinner para o transporte indicado.
    pub fn start(transport_number: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("START_TRIP: {transport_number}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para a fase ativa.
    pub fn phase(&self, phase: Phase) {
        self.pb.set_message(format!("{phase}"));
    }

    /// Registra uma entrega confirmada (parada `index` de `total`).
    pub fn stop_delivered(&self, branch_name: &str, index: usize, total: usize) {
        self.pb.println(format!(
            "  {} Delivered {index}/{total}: {branch_name}",
            self.green.apply_to("✓")
        ));
    }

    /// Exibe uma falha de validação; a fase não avança.
    pub fn validation_failed(&self, err: &TankflowError) {
        self.pb.println(format!(
            "  {} {err}",
            self.yellow.apply_to("!")
        ));
    }

    /// Finaliza o spinner e imprime o resumo agregado da viagem.
    pub fn complete(&self, summary: &TripSummary) {
        self.pb.finish_and_clear();
        println!(
            "  {} Trip {} completed — {} stop(s) delivered",
            self.green.apply_to("✓"),
            summary.transport_number,
            summary.stops_delivered
        );
        println!();
        println!("{}", self.green.apply_to("─── Trip Summary ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(summary).unwrap_or_default()
        );
    }
}
