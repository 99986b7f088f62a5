use rand::Rng;
use rand::seq::SliceRandom;

/// Interview prompts served by `GET /question`.
pub const QUESTIONS: &[&str] = &[
    "Tell me about yourself.",
    "How do you handle pressure or tight deadlines?",
    "Where do you see yourself in 5 years?",
    "How do you handle criticism?",
    "How do you stay motivated when work is repetitive?",
    "How do you deal with failure or mistakes?",
    "What are your strengths?",
    "What is your biggest weakness?",
    "How do you manage stress?",
    "Why do you want this job?",
    "Describe a challenge you overcame.",
];

/// Pick a question uniformly at random.
pub fn random_question() -> &'static str {
    pick(&mut rand::thread_rng())
}

fn pick<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    QUESTIONS.choose(rng).copied().unwrap_or(QUESTIONS[0])
}
