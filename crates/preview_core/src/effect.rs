use crate::AttemptId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartLoad { attempt: AttemptId, url: String },
    ReleaseDocument { attempt: AttemptId },
    RenderPage { attempt: AttemptId, page: u32 },
    Print { attempt: AttemptId, url: String },
    Share { url: String, name: String },
    PrepareEmbed { attempt: AttemptId, url: String },
    OpenEmbed { attempt: AttemptId },
}
