//! Fixed texts the client inserts into the conversation.

use interview_types::Language;

/// Sent on the user's behalf when a fresh session stays silent.
pub const GREETING: &str = "Xin chào!";

pub fn evaluating(language: Language) -> &'static str {
    match language {
        Language::Vi => {
            "⏳ **Đang tổng kết buổi phỏng vấn...**\n\nVui lòng đợi trong giây lát, AI đang đánh giá và tổng hợp kết quả của bạn."
        }
        Language::En => {
            "⏳ **Evaluating your interview...**\n\nPlease wait, AI is analyzing and summarizing your performance."
        }
    }
}

pub fn evaluation(language: Language, text: &str) -> String {
    match language {
        Language::Vi => format!(
            "## 📊 ĐÁNH GIÁ TỔNG KẾT\n\n{}\n\n---\n\n✅ **Cảm ơn bạn đã tham gia buổi phỏng vấn!**",
            text
        ),
        Language::En => format!(
            "## 📊 INTERVIEW EVALUATION\n\n{}\n\n---\n\n✅ **Thank you for taking part in the interview!**",
            text
        ),
    }
}

pub fn confirm_end(language: Language) -> &'static str {
    match language {
        Language::Vi => "Bạn có chắc muốn kết thúc buổi phỏng vấn?",
        Language::En => "Are you sure you want to end the interview?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_wraps_text() {
        let wrapped = evaluation(Language::Vi, "Điểm: 8/10");
        assert_eq!(
            wrapped,
            "## 📊 ĐÁNH GIÁ TỔNG KẾT\n\nĐiểm: 8/10\n\n---\n\n✅ **Cảm ơn bạn đã tham gia buổi phỏng vấn!**"
        );
        assert!(evaluation(Language::En, "8/10").contains("\n\n8/10\n\n"));
    }
}
