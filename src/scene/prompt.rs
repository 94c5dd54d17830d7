//! Instruction text sent alongside the images.

use crate::scene::types::SceneRequest;

/// Which instruction template a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// A scene photo was supplied; the subject goes into that photo.
    SceneImage,
    /// Separate person and bicycle photos, scene described in text.
    TwoImageTextScene,
    /// One photo; its background is replaced by the described scene.
    SingleImageTextScene,
}

/// What must be carried over pixel-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// The person only.
    Person,
    /// The person and a bicycle from a separate photo.
    PersonAndBicycle,
}

impl Subject {
    /// Phrase used inside the instructions.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::PersonAndBicycle => "person and bicycle",
        }
    }

    /// Which of the supplied images contain the subject.
    fn source_images(&self) -> &'static str {
        match self {
            Self::Person => "the first image",
            Self::PersonAndBicycle => "the first and second images",
        }
    }
}

const QUALITY_RULE: &str = "Output quality is the top priority: photorealistic, sharp down to the \
finest detail, free of noise or artifacts, on par with a photo from a professional camera.";

const IMAGE_ONLY_RULE: &str = "Return only the final image. Do NOT add any text.";

/// Built instructions plus the decision that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenePrompt {
    template: PromptTemplate,
    subject: Subject,
    text: String,
}

impl ScenePrompt {
    /// Chooses the template for `request` and renders its text.
    ///
    /// A scene image always wins over scene text; the text then only guides
    /// lighting and mood.
    pub fn build(request: &SceneRequest) -> Self {
        let has_bike = request.bike_image.is_some();
        let subject = if has_bike {
            Subject::PersonAndBicycle
        } else {
            Subject::Person
        };
        let scene = request.scene_text.trim();

        let (template, text) = if request.scene_image.is_some() {
            (PromptTemplate::SceneImage, scene_image_prompt(subject, scene))
        } else if has_bike {
            (PromptTemplate::TwoImageTextScene, two_image_prompt(scene))
        } else {
            (PromptTemplate::SingleImageTextScene, single_image_prompt(scene))
        };

        Self {
            template,
            subject,
            text,
        }
    }

    /// Template that was selected.
    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    /// Subject the instructions protect.
    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Full instruction text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn scene_image_prompt(subject: Subject, guidance: &str) -> String {
    let s = subject.phrase();
    format!(
        "You are an expert AI photo compositor. Your task is to take the {s} from {src} and \
place them realistically into the scene shown in the final image.\n\n\
Additional guidance from the user (use it only to adjust lighting and atmosphere): \"{guidance}\".\n\n\
MANDATORY RULES:\n\
1. MOST IMPORTANT: Keep the {s} exactly as they appear in their original photo. Treat them as a \
separate, locked layer; do not change, redraw or retouch any detail.\n\
2. The scene from the final image must also be preserved. Only add the {s} into it seamlessly.\n\
3. The integration must look natural in lighting, shadows and perspective. Adjust the light on \
the {s} to match the new scene.\n\
4. {QUALITY_RULE}\n\
5. {IMAGE_ONLY_RULE}",
        src = subject.source_images(),
    )
}

fn two_image_prompt(scene: &str) -> String {
    format!(
        "You are an expert AI photo editor. Your task is to extract the person from the first \
image and the bicycle from the second image, then composite them seamlessly into a completely \
new scene.\n\n\
The requested new scene is: \"{scene}\".\n\n\
MANDATORY RULES:\n\
1. MOST IMPORTANT: Keep the person and bicycle exactly as they appear in the original photos. \
Treat them as a separate, locked layer; do not change, redraw or retouch any of their details. \
All changes apply to the scene only.\n\
2. The integration must look natural in lighting, shadows and perspective.\n\
3. {QUALITY_RULE}\n\
4. {IMAGE_ONLY_RULE}"
    )
}

fn single_image_prompt(scene: &str) -> String {
    format!(
        "You are an expert AI photo editor. Your task is to separate the person and bicycle in \
the provided photo from their current background and place them into a completely new scene.\n\n\
The requested new scene is: \"{scene}\".\n\n\
MANDATORY RULES:\n\
1. MOST IMPORTANT: Keep the person and bicycle exactly as they appear in the original photo. \
Treat them as a separate, locked layer; do not change, redraw or retouch any of their details. \
All changes apply to the scene only.\n\
2. Only change the background and surroundings behind them.\n\
3. The integration must look natural in lighting, shadows and perspective.\n\
4. {QUALITY_RULE}\n\
5. {IMAGE_ONLY_RULE}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageInput;

    fn img() -> ImageInput {
        ImageInput::new(vec![0x89, 0x50], "image/png")
    }

    #[test]
    fn test_single_image_text_scene() {
        let prompt = ScenePrompt::build(&SceneRequest::new(img(), "sunset beach"));
        assert_eq!(prompt.template(), PromptTemplate::SingleImageTextScene);
        assert_eq!(prompt.subject(), Subject::Person);
        assert!(prompt.text().contains("\"sunset beach\""));
    }

    #[test]
    fn test_two_image_text_scene() {
        let request = SceneRequest::new(img(), "mountain pass").with_bike_image(img());
        let prompt = ScenePrompt::build(&request);
        assert_eq!(prompt.template(), PromptTemplate::TwoImageTextScene);
        assert_eq!(prompt.subject(), Subject::PersonAndBicycle);
    }

    #[test]
    fn test_scene_image_takes_precedence_over_text() {
        let without_text = SceneRequest::new(img(), "").with_scene_image(img());
        let with_text = SceneRequest::new(img(), "golden hour").with_scene_image(img());

        let a = ScenePrompt::build(&without_text);
        let b = ScenePrompt::build(&with_text);
        assert_eq!(a.template(), PromptTemplate::SceneImage);
        assert_eq!(b.template(), PromptTemplate::SceneImage);
        assert!(b.text().contains("golden hour"));
    }

    #[test]
    fn test_scene_image_with_bike_mentions_both_subjects() {
        let request = SceneRequest::new(img(), "   ")
            .with_bike_image(img())
            .with_scene_image(img());
        let prompt = ScenePrompt::build(&request);
        assert_eq!(prompt.template(), PromptTemplate::SceneImage);
        assert_eq!(prompt.subject().phrase(), "person and bicycle");
        assert!(prompt.text().contains("the first and second images"));
    }

    #[test]
    fn test_scene_image_without_bike_mentions_person_only() {
        let request = SceneRequest::new(img(), "").with_scene_image(img());
        let prompt = ScenePrompt::build(&request);
        assert!(prompt.text().contains("take the person from the first image"));
    }

    #[test]
    fn test_every_template_carries_the_hard_rules() {
        let requests = [
            SceneRequest::new(img(), "x"),
            SceneRequest::new(img(), "x").with_bike_image(img()),
            SceneRequest::new(img(), "x").with_scene_image(img()),
        ];
        for request in &requests {
            let text = ScenePrompt::build(request).text().to_string();
            assert!(text.contains("exactly as they appear"));
            assert!(text.contains("lighting, shadows and perspective"));
            assert!(text.contains(QUALITY_RULE));
            assert!(text.contains(IMAGE_ONLY_RULE));
        }
    }
}
