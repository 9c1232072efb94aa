use std::io::{self, Write};

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env)?; } else { serde_json::to_writer(&mut *w, env)?; }
        writeln!(w)
    }
}

// one header line; the body only when pretty output is requested
pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let kind = if env.apply { "Result" } else { "Plan" };
        writeln!(w, "{kind}: {}", env.op)?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut *w, env.body())?;
            writeln!(w)?;
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn new(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.presenter.emit(env, &mut out)?;
        out.flush()
    }
}
