//! Interface de linha de comando do tankflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (status, show, demo)
//! e flags globais (--store, --verbose).

use clap::{Parser, Subcommand};

/// tankflow — fluxo de trabalho do motorista para transporte interno de
/// combustível.
#[derive(Debug, Parser)]
#[command(name = "tankflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo JSON de jobs (sobrepõe a configuração).
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista os jobs internos pendentes, mais recente primeiro.
    Status,

    /// Mostra um job pelo id, com a fase em que uma sessão retomaria.
    Show {
        /// Id do job de transporte.
        job_id: String,
    },

    /// Executa a demonstração embutida do fluxo completo do motorista.
    Demo,
}
