// All LLM prompt templates for profile extraction, fit analysis and cover
// letters. Placeholders in `{braces}` are filled with `.replace` before sending.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Role line for profile extraction. Combined with the JSON-only rules.
pub const PROFILE_ROLE: &str =
    "You are an expert technical recruiter who reads resumes and extracts structured candidate profiles.";

/// Profile extraction prompt. Replace `{resume_text}` before sending.
pub const PROFILE_PROMPT_TEMPLATE: &str = r#"Extract a structured candidate profile from the resume below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "skills": ["Python", "Machine Learning"],
  "yearsOfExperience": 6.5,
  "techStack": ["PyTorch", "Kubernetes", "PostgreSQL"],
  "jobHistory": [
    {
      "company": "Acme",
      "title": "Senior ML Engineer",
      "startDate": "2021-03",
      "endDate": null,
      "highlights": ["Cut inference latency by 40%"]
    }
  ],
  "education": [
    {"institution": "TU Delft", "degree": "MSc", "field": "Computer Science", "graduationYear": 2017}
  ],
  "seniorityLevel": "senior",
  "trajectory": "Backend engineer moving into applied ML",
  "confidence": 0.85,
  "warnings": []
}

Rules:
- seniorityLevel is one of: junior, mid, senior, staff, principal, executive.
- yearsOfExperience counts professional experience only; 0 if none is stated.
- endDate is null for the current role.
- confidence (0.0 to 1.0) reflects how complete and legible the resume was.
- warnings lists anything you could not read or had to guess.

{grounding}

RESUME:
{resume_text}"#;

/// Role line for fit analysis.
pub const FIT_ROLE: &str =
    "You are a hiring manager scoring how well a candidate fits a specific job opening.";

/// Fit analysis prompt. Replace `{profile_json}` and `{job_json}` before sending.
pub const FIT_PROMPT_TEMPLATE: &str = r#"Score the candidate against the job.

Return a JSON object with this EXACT schema (no extra fields):
{
  "breakdown": {
    "skills":     {"score": 85, "matched": ["Python"], "missing": ["Go"], "rationale": "..."},
    "experience": {"score": 70, "matched": [], "missing": [], "rationale": "..."},
    "techStack":  {"score": 60, "matched": ["PyTorch"], "missing": ["Ray"], "rationale": "..."},
    "seniority":  {"score": 90, "matched": [], "missing": [], "rationale": "..."}
  },
  "confidence": 0.8,
  "summary": "One or two sentences.",
  "concerns": ["..."],
  "strengths": ["..."]
}

Rules:
- Every sub-score is an integer from 0 to 100.
- skills: how many of the job's required skills the candidate demonstrably has.
- experience: years and relevance of experience against what the job asks for.
- techStack: overlap between the job's technologies and the candidate's.
- seniority: distance between the role's level and the candidate's level.
- Do NOT compute an overall score; it is derived from the sub-scores.

{grounding}

CANDIDATE PROFILE:
{profile_json}

JOB:
{job_json}"#;

/// Role line for cover letters.
pub const LETTER_ROLE: &str =
    "You are a career coach who writes concise, specific cover letters.";

/// Cover letter prompt. Replace `{profile_json}`, `{job_json}`, `{analysis_json}`
/// and `{template_section}` before sending.
pub const LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter for this candidate and job.

Return a JSON object with this EXACT schema (no extra fields):
{
  "content": "Dear Hiring Manager, ...",
  "highlightedExperiences": ["Led migration of the feature store at Acme"],
  "customizations": ["Referenced the team's move to Kubernetes"]
}

Rules:
- 250 to 400 words, plain text, paragraphs separated by blank lines.
- Lead with the strengths from the fit analysis; address at most one concern.
- highlightedExperiences lists the résumé experiences the letter draws on.
- customizations lists what was tailored to this specific company or role.
{template_section}
{grounding}

CANDIDATE PROFILE:
{profile_json}

JOB:
{job_json}

FIT ANALYSIS:
{analysis_json}"#;

/// Inserted into the letter prompt when the request carries a template.
pub const LETTER_TEMPLATE_SECTION: &str = r#"- Follow the structure and voice of this template, replacing its placeholders:
---
{template}
---"#;
