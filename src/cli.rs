//! Interface de linha de comando do adcrew baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, plan, roles)
//! e flags globais (--config, --verbose, --json).

use std::path::PathBuf;

use chrono::Weekday;
use clap::{Parser, Subcommand, ValueEnum};

/// adcrew: executa em lote as tarefas dos funcionários de IA de anúncios.
#[derive(Debug, Parser)]
#[command(name = "adcrew", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./adcrew.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite logs e relatórios em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

/// Dia da semana aceito pela CLI, mapeado para [`Weekday`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DayArg {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<DayArg> for Weekday {
    fn from(day: DayArg) -> Self {
        match day {
            DayArg::Mon => Weekday::Mon,
            DayArg::Tue => Weekday::Tue,
            DayArg::Wed => Weekday::Wed,
            DayArg::Thu => Weekday::Thu,
            DayArg::Fri => Weekday::Fri,
            DayArg::Sat => Weekday::Sat,
            DayArg::Sun => Weekday::Sun,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um lote com os colaboradores reais.
    Run {
        /// Arquivo JSON ou TOML com as tarefas de cada usuário.
        #[arg(long)]
        file: PathBuf,

        /// Armazenamento de imagens: banco SQLite (`.db`, `.sqlite`, `.sqlite3`)
        /// ou snapshot JSON, lido e regravado.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Máximo de usuários em paralelo; sobrepõe a configuração.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Mostra o plano de execução de cada usuário sem executar nada.
    Plan {
        /// Arquivo JSON ou TOML com as tarefas de cada usuário.
        #[arg(long)]
        file: PathBuf,

        /// Dia da semana a simular (padrão: hoje em UTC).
        #[arg(long, value_enum)]
        day: Option<DayArg>,
    },

    /// Lista os funcionários, a ordem de execução e as regras de dependência.
    Roles,
}
