//! Canned phrases and the instruction blocks built from them.

use std::fmt;
use std::str::FromStr;

/// Target areas sampled in batch mode.
pub const BATCH_TARGET_AREAS: [&str; 3] = ["shirt", "sign", "banner"];

pub const DEFAULT_PLACEMENT: &str = "in the most semantically appropriate location";
pub const DEFAULT_STYLE: &str = "natural, contextually appropriate styling";

const PLACEMENT_RULES: &[(&str, &str)] = &[
	("baseball", "in hands, being thrown/caught, or positioned naturally in a sports context"),
	("cap", "properly fitted on a person's head with natural positioning"),
	("glasses", "correctly positioned on a person's face"),
	("book", "in hands, on surfaces, or in natural reading positions"),
	("phone", "in hands or natural usage positions"),
	("ball", "in hands, on ground, or in active play context"),
];

const STYLE_SPECS: &[(&str, &str)] = &[
	("casual", "casual, handwritten-style font with relaxed positioning"),
	("formal", "clean, professional typography with precise alignment"),
	("artistic", "creative, stylized text with artistic flair"),
	("sporty", "bold, athletic-style lettering appropriate for sports context"),
	("vintage", "retro-style typography with aged appearance"),
];

const AREA_SPECS: &[(&str, &str)] = &[
	("shirt", "on the chest/front area of clothing, following fabric contours and wrinkles"),
	("sign", "on visible sign surfaces with appropriate perspective correction"),
	("banner", "on banner or poster surfaces with natural draping"),
	("book", "on book covers or visible pages"),
	("wall", "on wall surfaces with appropriate perspective"),
	("ground", "on ground surfaces like pavement or floor"),
];

pub const DETECT_PROMPT: &str = "\
Analyze this image and identify the main object. Provide a single, concise object name that best describes what you see.

Requirements:
- Return only the object name (e.g., \"baseball\", \"cap\", \"phone\", \"book\")
- Use simple, common terms
- Focus on the most prominent object in the image
- Keep it to 1-2 words maximum
";

pub const ANALYZE_PROMPT: &str = "\
Analyze this image and provide detailed suggestions for synthetic data augmentation.

Please provide:
1. SCENE DESCRIPTION: What's in the image and the overall context
2. OBJECT INSERTION OPPORTUNITIES: What objects could be naturally added and where
3. TEXT INSERTION OPPORTUNITIES: Where text could be placed (shirts, signs, etc.)
4. OPTIMAL PLACEMENT ZONES: Specific areas that would work best for insertions
5. LIGHTING CONSIDERATIONS: How lighting affects insertion realism
6. CHALLENGES: Potential difficulties for synthetic insertion

Be specific about coordinates or regions where possible.
";

/// Coarse realism tier for object insertion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnhancementLevel {
	Basic,
	#[default]
	Realistic,
	Photorealistic,
}

impl EnhancementLevel {
	pub fn phrase(self) -> &'static str {
		match self {
			EnhancementLevel::Basic => "natural placement and basic lighting matching",
			EnhancementLevel::Realistic => {
				"realistic lighting, shadows, perspective correction, and natural integration"
			}
			EnhancementLevel::Photorealistic => {
				"photorealistic lighting analysis, accurate shadow casting, precise perspective transformation, color temperature matching, and seamless blending"
			}
		}
	}
}

impl FromStr for EnhancementLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"basic" => Ok(EnhancementLevel::Basic),
			"realistic" => Ok(EnhancementLevel::Realistic),
			"photorealistic" => Ok(EnhancementLevel::Photorealistic),
			other => Err(format!("unknown enhancement level: {other}")),
		}
	}
}

impl fmt::Display for EnhancementLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EnhancementLevel::Basic => "basic",
			EnhancementLevel::Realistic => "realistic",
			EnhancementLevel::Photorealistic => "photorealistic",
		};
		f.write_str(s)
	}
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
	table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn placement_phrase(label: &str) -> &'static str {
	lookup(PLACEMENT_RULES, label).unwrap_or(DEFAULT_PLACEMENT)
}

pub fn style_phrase(style: Option<&str>) -> &'static str {
	style.and_then(|s| lookup(STYLE_SPECS, s)).unwrap_or(DEFAULT_STYLE)
}

pub fn area_phrase(area: &str) -> String {
	lookup(AREA_SPECS, area)
		.map(str::to_string)
		.unwrap_or_else(|| format!("on the {area} surface"))
}

pub fn build_object_prompt(label: &str, level: EnhancementLevel) -> String {
	format!(
		"Analyze the scene and seamlessly insert the {label} into the image.

REQUIREMENTS:
1. PLACEMENT: Position the {label} {placement}
2. REALISM: Apply {realism}
3. SCALING: Size the object appropriately for the scene scale and perspective
4. LIGHTING: Match ambient lighting, shadows, and reflections
5. INTEGRATION: Ensure the object looks naturally part of the original scene

TECHNICAL CONSIDERATIONS:
- Analyze depth and perspective to position correctly in 3D space
- Consider object occlusion and layering
- Maintain consistent lighting direction and intensity
- Apply appropriate surface reflections and material properties
- Ensure edge blending is seamless and natural

Generate the final composite image with the {label} naturally integrated.
",
		placement = placement_phrase(label),
		realism = level.phrase(),
	)
}

pub fn build_text_prompt(text: &str, target_area: &str, style: Option<&str>) -> String {
	format!(
		"Insert the text \"{text}\" naturally into the image on the {target_area}.

REQUIREMENTS:
1. PLACEMENT: Position text {area}
2. TYPOGRAPHY: Use {typography}
3. PERSPECTIVE: Apply correct perspective transformation to match surface angle
4. INTEGRATION: Ensure text follows surface contours (wrinkles, curves, etc.)
5. VISIBILITY: Choose colors that provide good contrast and readability
6. REALISM: Make text appear as if originally part of the scene

TECHNICAL CONSIDERATIONS:
- Match lighting conditions (shadows, highlights on text)
- Apply surface material properties (fabric texture, reflections)
- Ensure text perspective matches viewing angle
- Consider text size appropriate for distance and context
- Apply subtle distortions for fabric/surface conformity

Generate the image with \"{text}\" naturally integrated on the {target_area}.
",
		area = area_phrase(target_area),
		typography = style_phrase(style),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_objects_get_their_placement_rule() {
		for (label, rule) in PLACEMENT_RULES {
			let p = build_object_prompt(label, EnhancementLevel::Realistic);
			assert!(p.contains(label));
			assert!(p.contains(rule));
			assert!(!p.contains(DEFAULT_PLACEMENT));
		}
	}

	#[test]
	fn unknown_object_gets_default_placement() {
		let p = build_object_prompt("umbrella", EnhancementLevel::Basic);
		assert!(p.contains("umbrella"));
		assert!(p.contains(DEFAULT_PLACEMENT));
		assert!(p.contains(EnhancementLevel::Basic.phrase()));
	}

	#[test]
	fn unknown_enhancement_falls_back_to_realistic() {
		let level: EnhancementLevel = "ultra".parse().unwrap_or_default();
		assert_eq!(level, EnhancementLevel::Realistic);
		assert_eq!("Photorealistic".parse::<EnhancementLevel>(), Ok(EnhancementLevel::Photorealistic));
	}

	#[test]
	fn text_prompt_repeats_text_and_uses_phrases() {
		let styles = STYLE_SPECS.iter().map(|(k, _)| Some(*k)).chain([None, Some("gothic")]);
		for style in styles {
			for (area, area_rule) in AREA_SPECS {
				let p = build_text_prompt("Team Alpha", area, style);
				assert!(p.matches("\"Team Alpha\"").count() >= 2);
				assert!(p.contains(area_rule));
				assert!(p.contains(style_phrase(style)));
			}
		}
	}

	#[test]
	fn unknown_area_and_style_use_defaults() {
		let p = build_text_prompt("GO", "mug", Some("gothic"));
		assert!(p.contains("on the mug surface"));
		assert!(p.contains(DEFAULT_STYLE));
	}
}
