use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(
        "host plugin interface version {found} is outside the supported range {min}..={max}; refusing to render"
    )]
    IncompatibleHost { found: u32, min: u32, max: u32 },
}
