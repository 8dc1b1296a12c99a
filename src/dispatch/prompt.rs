// ABOUTME: Builds provider-agnostic message lists for each dispatch path
// ABOUTME: Code review, grounded answer, rolling-history chat and multimodal layouts

use crate::attachments::Attachment;
use crate::classifier::RequestMode;
use crate::llm::prompts::{self, VIDEO_SUMMARY_PROMPT};
use crate::llm::ChatMessage;

use super::DispatchRequest;

/// Messages for a text-only request
///
/// Code review sends only the current message. Grounded answers send the
/// augmented prompt. Plain chat replays the rolling history first.
pub(super) fn text_messages(request: &DispatchRequest) -> Vec<ChatMessage> {
    let has_context = request.context.has_context();
    let system = ChatMessage::system(prompts::system_prompt_for(request.mode, has_context));

    if request.mode == RequestMode::CodeSecurityScan {
        return vec![system, ChatMessage::user(request.message.as_str())];
    }

    if has_context {
        return vec![system, ChatMessage::user(request.context.augment(&request.message))];
    }

    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(system);
    messages.extend(request.history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(request.message.as_str()));
    messages
}

/// Messages for an attached file
pub(super) fn attachment_messages(message: &str, attachment: &Attachment) -> Vec<ChatMessage> {
    let system = ChatMessage::system(prompts::SOFIA_SYSTEM_PROMPT);
    let question = if message.trim().is_empty() {
        "Please describe and summarize this file."
    } else {
        message
    };

    let user = match attachment {
        Attachment::Image(image) => ChatMessage::user(question).with_image(image.clone()),
        Attachment::Document { text, .. } => {
            ChatMessage::user(format!("Document content:\n{text}\n\n{question}"))
        }
    };
    vec![system, user]
}

/// Messages for a shared video, once its transcript is known
pub(super) fn transcript_messages(message: &str, transcript: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(VIDEO_SUMMARY_PROMPT),
        ChatMessage::user(format!("Video transcript:\n{transcript}\n\nUser message: {message}")),
    ]
}
