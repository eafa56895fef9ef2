//! Built-in rule tables.
//!
//! Compiled once via `OnceLock` and shared for the process lifetime. The
//! German table covers the 19th-century orthography families found in
//! Nietzsche-era printings (th→t, ey→ei, c→k/z, ß pre-reform, -iren verb
//! endings); the OCR table covers the misreads observed in scanned
//! Victorian-era translation PDFs (the `tlie`/`witli` family, hyphenated
//! line breaks, column-layout spacing).
//!
//! Every entry is either a whole-word rule or an anchored regex. Broad
//! substring rewrites (a bare `th → t`, `rn → m`) are deliberately absent:
//! they corrupt modern words (`Theater`, `modern`) and no amount of
//! ordering saves them.

use std::sync::OnceLock;

use super::rules::{RuleSet, RuleSpec};

/// 19th-century German word spellings → modern forms.
const GERMAN_WORD_RULES: &[(&str, &str)] = &[
    // ie → i (older convention for long i)
    ("giebt", "gibt"),
    ("gieb", "gib"),
    // th → t (Greek-derived spelling abandoned)
    ("Theil", "Teil"),
    ("theil", "teil"),
    ("theilen", "teilen"),
    ("Thier", "Tier"),
    ("thier", "tier"),
    ("Thür", "Tür"),
    ("thür", "tür"),
    ("Thun", "Tun"),
    ("thun", "tun"),
    ("That", "Tat"),
    ("that", "tat"),
    ("gethan", "getan"),
    ("Thatbestand", "Tatbestand"),
    ("Thatsache", "Tatsache"),
    ("thatsächlich", "tatsächlich"),
    ("Werth", "Wert"),
    ("werth", "wert"),
    ("werthvoll", "wertvoll"),
    ("Unwerth", "Unwert"),
    ("Muth", "Mut"),
    ("muth", "mut"),
    ("muthig", "mutig"),
    ("Demuth", "Demut"),
    ("Wehmuth", "Wehmut"),
    ("Armuth", "Armut"),
    ("Noth", "Not"),
    ("noth", "not"),
    ("nöthig", "nötig"),
    ("Nothwendigkeit", "Notwendigkeit"),
    ("nothwendig", "notwendig"),
    ("Rath", "Rat"),
    ("rath", "rat"),
    ("rathen", "raten"),
    ("Räthsel", "Rätsel"),
    ("räthselhaft", "rätselhaft"),
    // ey → ei
    ("seyn", "sein"),
    ("sey", "sei"),
    ("Seyn", "Sein"),
    // c → k or z (Latin spelling abandoned)
    ("Cultur", "Kultur"),
    ("cultur", "kultur"),
    ("Accent", "Akzent"),
    ("Concert", "Konzert"),
    ("Medicin", "Medizin"),
    // ph → f (Greek spelling simplified)
    ("Phantasie", "Fantasie"),
    ("phantastisch", "fantastisch"),
    ("Photographie", "Fotografie"),
    // ß pre-1996 forms
    ("daß", "dass"),
    ("muß", "muss"),
    ("Fluß", "Fluss"),
    ("Schluß", "Schluss"),
    ("Genuß", "Genuss"),
    ("Bewußtsein", "Bewusstsein"),
    ("bewußt", "bewusst"),
    ("unbewußt", "unbewusst"),
    ("gewiß", "gewiss"),
    ("Gewißheit", "Gewissheit"),
    // double-consonant variations
    ("Litteratur", "Literatur"),
    ("litterarisch", "literarisch"),
];

/// Systematic verb-ending regexes; whole-word th-family words are handled
/// by the table above rather than a broad `th`-vowel rewrite.
const GERMAN_PATTERN_RULES: &[(&str, &str)] = &[
    // Final -iren → -ieren (verb infinitives)
    (r"(\w+)iren\b", "${1}ieren"),
    // -irung → -ierung
    (r"(\w+)irung\b", "${1}ierung"),
    // -irt → -iert
    (r"(\w+)irt\b", "${1}iert"),
];

/// OCR misreads found in scanned translation sources, whole-word only.
const OCR_WORD_RULES: &[(&str, &str)] = &[
    ("tlie", "the"),
    ("liave", "have"),
    ("wliich", "which"),
    ("tliis", "this"),
    ("tliat", "that"),
    ("wlien", "when"),
    ("tlien", "then"),
    ("otlier", "other"),
    ("tliere", "there"),
    ("tliey", "they"),
    ("tlieir", "their"),
    ("tliose", "those"),
    ("tliough", "though"),
    ("tlirough", "through"),
    ("witli", "with"),
    ("notliing", "nothing"),
    ("sometliing", "something"),
    ("everytliing", "everything"),
    ("anytliing", "anything"),
    ("cliange", "change"),
    ("cliaracter", "character"),
    ("pliilosophy", "philosophy"),
    ("pliilosopher", "philosopher"),
    ("reahty", "reality"),
];

/// OCR structural fixes. The hyphen rejoin runs before spacing collapse so
/// `philoso-\n  pher` comes back together without a stray space.
const OCR_PATTERN_RULES: &[(&str, &str)] = &[
    // word split across a line break
    (r"(\w+)-\s*\n\s*(\w+)", "${1}${2}"),
    // French quote misreads in the scanned Zimmern printing
    (r"sl ne cherche", "il ne cherche"),
    (r"le hien", "le bien"),
    // column-layout spacing
    (r" {2,}", " "),
];

fn build(name: &str, words: &[(&str, &str)], patterns: &[(&str, &str)]) -> RuleSet {
    let mut specs: Vec<RuleSpec> = Vec::with_capacity(words.len() + patterns.len());
    specs.extend(words.iter().map(|(p, r)| RuleSpec::word(*p, *r)));
    specs.extend(patterns.iter().map(|(p, r)| RuleSpec::regex(*p, *r)));
    RuleSet::compile(name, &specs).expect("built-in rule table must compile")
}

/// Built-in German orthography table.
pub fn german_orthography() -> &'static RuleSet {
    static RULES: OnceLock<RuleSet> = OnceLock::new();
    RULES.get_or_init(|| build("german-orthography", GERMAN_WORD_RULES, GERMAN_PATTERN_RULES))
}

/// Built-in OCR-correction table.
pub fn ocr_corrections() -> &'static RuleSet {
    static RULES: OnceLock<RuleSet> = OnceLock::new();
    RULES.get_or_init(|| build("ocr-corrections", OCR_WORD_RULES, OCR_PATTERN_RULES))
}
