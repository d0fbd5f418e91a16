use crate::models::StyleType;

/// Instruction text for a style preset. Any language other than `zh` gets the English text.
pub fn select_prompt(style: StyleType, lang: &str) -> &'static str {
    let chinese = lang.trim().eq_ignore_ascii_case("zh") || lang.trim().to_ascii_lowercase().starts_with("zh-");

    match (style, chinese) {
        (StyleType::Id, _) => {
            "Generate a formal ID photo of the person in the image with a blue background, business attire, a gentle smile and a professional look. Keep the face identical to the original."
        }
        (StyleType::Festival, true) => {
            "Generate a festive celebration photo of the person in the image with a celebratory red background, a warm smile and Chinese New Year style decorations. Keep the face identical to the original."
        }
        (StyleType::Festival, false) => {
            "Generate a festive celebration photo of the person in the image with a celebratory red background and a warm smile. Keep the face identical to the original."
        }
        (StyleType::Memorial, true) => {
            "Generate a dignified black and white memorial portrait of the person in the image with a serious expression in a classic Chinese memorial style. Keep the face identical to the original."
        }
        (StyleType::Memorial, false) => {
            "Generate a dignified black and white memorial portrait of the person in the image with a serious expression. Keep the face identical to the original."
        }
    }
}
