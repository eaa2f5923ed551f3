//! The shipped SPAR multi-axis evaluation template.
//!
//! Seven axes scored 1-5, each located in the LLM reply by an all-caps
//! `*_RATING` keyword. Axis order matters: General Promise doubles as the
//! single-axis projection.

use super::multi_axis::{AxisTemplate, MultiAxisTemplate};

fn general_promise_axis() -> AxisTemplate {
    AxisTemplate {
        name: "General Promise".to_owned(),
        description: "Overall fit and potential for success in the SPAR research program"
            .to_owned(),
        ranking_keyword: "GENERAL_PROMISE_RATING".to_owned(),
        prompt_section: r#"## General Promise
This criterion measures the candidate's overall fit and potential for success in the SPAR research program, an AI safety and policy research program, based on their relevant technical or policy background, motivation, and concrete track record. Prioritize demonstrated achievements over abstract statements or general knowledge.

Note that "AI safety" refers to the mitigation of risks, particularly large-scale or catastrophic, from advanced AI (think AGI or ASI), including but not limited to, loss of control risks, catastrophic misuse risks, risks from digital minds, large-scale unemployment, and AI-assisted coups. SPAR offers a diverse set of projects across AI safety, security and policy, but they all have theories of change related to these risks.

What to Look For:

* General academic and technical background
  * Advanced, relevant degrees (e.g., ML/CS PhD, technical MSc, or policy-related MA/PhD)
  * Strong mathematical, research, or programming skills.
  * Strong policy research skills, or strong skills from adjacent fields (public policy, law, international relations, economics, etc.)
  * Cybersecurity skills, especially those relevant to AI security: securing model weights at frontier labs, evaluating cyber offense-defense capabilities, or working on compute governance.
  * Experience with areas relevant to large-scale misuse risks from AI (particularly CBRN and cyber).
  * Studies at a top university, especially in the top #100 worldwide.
* Experience specific to AI safety
  * Participation in highly selective research programs (e.g., MATS, GovAI, RAND TASP, Horizon, or the IAPS Fellowship)
  * Participation in introductory research programs (e.g., SPAR, AI Safety Camp, MARS, Pivotal Fellowship, Future Impact Group, or ERA)
  * Participation in ML upskilling programs (e.g. ARENA and MLAB)
  * Participation in introductory courses or fellowships (e.g., BlueDot's AI Safety Fundamentals, or CAIS's AI Safety, Ethics, and Society). Note that many groups around the world run reading groups based on BlueDot's AISF curriculum; these should be counted similarly.
  * Short self-guided introductions to AI safety or consumption of AI safety videos, articles, or newsletters
  * Independent research or significant project output.
* Research/Publication Record:
  * Quantity, quality, and notability of research outputs (papers, blogs, open-source projects).
* Professional Experience:
  * Substantial work at relevant organizations (industry, academia, civil society, government).
* Red Flags:
  * Generic, vague, or obviously AI-generated answers.
  * "Troll" applications (irrelevant, unserious, or copy-paste responses).
  * Responses that suggest the candidate does not care or is dismissive about existential or catastrophic risks or large-scale societal impacts from advanced AI.

**Scoring Guide (1-5):**

* **1 — Poor Fit / Red Flags:**
  * One-sentence answers, no AI safety engagement, applying because "AI is the future"
  * Copy-pasted generic chatbot responses without personal details
  * Argues AI safety concerns are overblown, should focus only on current bias
  * Completely unrelated background with no research connection
  * Joke/troll responses

* **2 — Minimal Relevant Background:**
  * CS undergrad, decent GPA, only standard coursework on CV
  * Took a short introductory course, interested but no concrete steps
  * Recent grad following AI safety social media but no technical projects or research
  * ML engineer treating SPAR as a generic ML opportunity
  * Policy student conflating AI governance with privacy/data protection

* **3 — Solid Foundation with Engagement:**
  * Strong CS undergrad from a top-50 university, completed AISF
  * Physics PhD with strong math background, starting to learn about AI safety through ARENA
  * Software engineer with several years of experience, recently completed AISF, genuine interest in transition
  * Policy researcher at a think tank, completed a governance course
  * ML master's student with good technical skills, participated in a university AI safety reading group

* **4 — Strong Track Record:**
  * Strong CS undergrad, completed AISF, built an interpretability project, active in a reading group
  * Previous SPAR participant with a resulting blog post on a research forum
  * ML engineer at a tech company, AI Safety Camp alumnus, working on safety side projects
  * Policy PhD on AI governance, published relevant papers, completed a governance fellowship
  * Experienced quant actively transitioning into safety work

* **5 — Exceptional Candidate:**
  * MATS graduate with a top-venue interpretability paper
  * GovAI Fellow, lead author on an influential governance paper
  * ML PhD from a top-5 program with multiple top-venue papers and a frontier-lab safety internship
  * Former frontier-lab safety researcher who led a research project
  * Senior policy advisor on AI chip controls, RAND TASP alumnus

**Notes:**
- Focus on specific evidence of achievement or fit for the program, not generic enthusiasm or "what should be done" claims.
- Ignore statements about the world unless clearly tied to the applicant's own work.
- Consider: would a top AI safety researcher be excited to mentor this person?

Before giving your score, explain your reasoning step by step.
Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn ml_skills_axis() -> AxisTemplate {
    AxisTemplate {
        name: "ML Skills".to_owned(),
        description: "Practical and theoretical machine learning expertise".to_owned(),
        ranking_keyword: "ML_SKILLS_RATING".to_owned(),
        prompt_section: r#"## ML Skills
This criterion evaluates the candidate's practical and theoretical machine learning expertise, including implementation, mathematical understanding, and applied work. Consider both classic and deep learning, coding skills, and breadth/depth of experience.

**What to look for:**
* Hands-on experience designing and training ML models, especially transformers or other foundation models
* Completed courses or degrees in ML, AI, statistics, or related fields
* Contributions to ML research projects, competition prizes, or ML open-source repositories
* Published research or technical reports in ML
* Demonstrated understanding of ML and Deep Learning concepts

**Scoring Guide (1-5):**

* **1 — Minimal ML Experience:**
    No relevant coursework, projects, or practical work in ML.

* **2 — Basic ML Foundation:**
    Completed intro ML/AI class (online or university), but little hands-on application.
    Can explain basic concepts (regression, classification) but no real projects.

* **3 — Demonstrated Application:**
    Built and trained models beyond tutorials (e.g., fine-tuned a pretrained model, implemented a paper).
    Has real coursework projects or personal experiments with neural networks.
    Understands core DL concepts (backprop, architectures, training dynamics).

* **4 — Advanced Practical Experience:**
    Multiple substantial ML projects with evidence of iteration and debugging.
    Published ML papers/pre-prints OR won ML competitions OR significant open-source contributions to ML-relevant libraries.
    Can implement papers from scratch, debug training issues, optimize performance.
    Industry ML experience or research lab involvement.

* **5 — ML Expertise:**
    Published at top venues (NeurIPS, ICML, ICLR) as key author.
    Major contributions to widely-used ML libraries.
    Senior ML role at a top-tier company or an ML role at a frontier AI lab.
    Demonstrated novel research contributions or breakthrough implementations.

Focus on specific ML achievements and concrete experience.
Before giving your score, explain your reasoning step by step.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn software_engineering_axis() -> AxisTemplate {
    AxisTemplate {
        name: "Software Engineering Skills".to_owned(),
        description: "Software engineering ability, especially in Python and ML frameworks"
            .to_owned(),
        ranking_keyword: "SOFTWARE_ENGINEERING_RATING".to_owned(),
        prompt_section: r#"## Software Engineering Skills
This axis measures the candidate's software engineering ability, with a bonus for experience relevant to ML-focused contexts (e.g., Python, PyTorch, TensorFlow, JAX). Consider both quality and depth of professional experience. You should be willing to trade off less experience specific to ML engineering if a candidate has excellent general SWE experience.

**What to look for:**

* Strong Python skills; ability to build, debug, and maintain complex codebases

* Experience with relevant ML frameworks (PyTorch, TensorFlow, JAX, etc.)

* Evidence of writing production-quality software (not just notebooks or scripts)

* Real-world software engineering experience at a company or research lab (preferably as a full employee, not only internships)

* Experience or awareness of good software practices (testing, version control, code review, CI/CD)

**Scoring Guide (1-5):**

* **1 — Minimal Software Experience:**
    Little or no experience coding beyond basic scripts.

* **2 — Basic Python Scripting:**
    Can write small Python scripts or notebooks, but has limited exposure to real software engineering practices.

* **3 — Practical Coding Experience:**
    Has built small to medium-sized projects, contributed to minor open-source projects, or obtained internship-level software engineering experience. If their experience is relevant to ML, a person at this level might have replicated a few ML papers or passed several classes about ML engineering.

* **4 — Professional Engineering Experience:**
    Has worked as a full-time software engineer in a company or research group (not just as an intern), or contributed to large, production codebases. If their experience is ML specific, this person has substantial ML engineering experience, for example having worked as an ML engineer professionally or made important contributions to several published ML projects.

* **5 — Expert Software or ML Engineer:**
    Demonstrated leadership in software engineering (e.g., major open-source maintainer, tech lead, or senior engineer at a top-tier company). Alternatively, shows deep expertise with relevant ML tooling, having e.g. contributed to top open-source ML libraries, contributed as an engineer to research published at a top ML venue, or worked as a professional ML engineer at a top-tier company.

Focus on professional engineering experience, codebase scale, and toolset expertise (especially Python/ML).
Before giving your score, explain your reasoning step by step.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn policy_experience_axis() -> AxisTemplate {
    AxisTemplate {
        name: "Policy Experience".to_owned(),
        description: "Experience in policy research related to technology, governance, or AI"
            .to_owned(),
        ranking_keyword: "POLICY_EXPERIENCE_RATING".to_owned(),
        prompt_section: r#"## Policy Experience
This criterion evaluates the candidate's experience in policy research — especially if the experience might prove relevant to AI policy, whether domestic or international. The focus is on work involving the systematic study, analysis, or development of public policy, regulatory frameworks, or governmental decision-making. **Note:** We do *not* count routine company policy writing (e.g., privacy policies), nor traditional political advocacy or campaign work, except where it includes substantial research or policy analysis.

**What to look for:**

* Direct involvement in policy research (e.g., government white papers, think tank analysis, academic studies on public policy)

* Experience in designing, evaluating, or analyzing laws, regulations, or public sector strategies

* Participation in government policy advisory groups, committees, or public consultation projects

* Contributions to policy-focused publications, reports, or peer-reviewed articles

* Relevant advanced study in public policy, law, international relations, or adjacent fields (especially with research output)

**Scoring Guide (1-5):**

* **1 — No Policy Research Experience:**
    No relevant policy research work, analysis, or studies. May have only routine corporate/governance experience.

* **2 — Limited Exposure:**
    Some engagement with policy research topics, or is pursuing a relevant undergraduate degree, but without real research output or practical involvement.

* **3 — Early Research Involvement:**
    Has participated as a junior analyst, intern, or contributor on policy research projects (e.g., think tanks, academic projects), or produced substantial extracurricular policy analysis (e.g., whitepapers, policy blogs).

* **4 — Experienced Policy Researcher:**
    Has authored/co-authored policy research reports, academic publications, or led significant research in a think tank, university, or governmental setting.

* **5 — Leading Policy Researcher:**
    Extensive track record of major policy research impact — e.g., lead author on key government reports, high-profile think tank studies, or has shaped national/international policy through rigorous research and analysis.

Focus on concrete policy research outputs, depth of analysis, and real-world impact — not general advocacy or campaign participation.
Before giving your score, explain your reasoning step by step.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn ai_safety_understanding_axis() -> AxisTemplate {
    AxisTemplate {
        name: "Understanding of AI Safety".to_owned(),
        description: "Depth of understanding of technical AI safety concepts and research"
            .to_owned(),
        ranking_keyword: "AI_SAFETY_UNDERSTANDING_RATING".to_owned(),
        prompt_section: r#"## Understanding of AI Safety
This criterion evaluates the candidate's depth of understanding of technical AI safety — specifically, issues related to AI alignment, interpretability, and existential risks from advanced AI systems. Only technical AI safety knowledge should be counted here; general AI ethics, fairness, privacy, or regulatory work does NOT qualify unless strictly related to existential risks from AI.

**What You Can Actually Observe in Applications:**

* **From "How have you engaged with AI safety?":**
  * Specific programs, courses, or resources mentioned (and level of detail)
  * Whether they name specific research agendas, papers, or researchers
  * How they characterize their engagement (passive consumption vs. active participation)
  * Use of terminology — correct, incorrect, or generic

* **From "Career interests/study plans" and "How SPAR contributes":**
  * Whether they connect SPAR to specific AI safety problems or research areas
  * Specificity about which aspects of AI safety they want to work on
  * Whether they conflate AI safety with AI ethics/bias/fairness
  * Level of concreteness about safety-relevant goals

* **From CV/profile:**
  * AI safety-relevant projects, papers, or blog posts
  * Courses taken (distinguishing AI safety from general ML/AI ethics)
  * Research experience with safety-adjacent topics
  * Participation in safety programs or communities

**Red Flags Indicating Confusion:**
* Conflates AI safety with traditional AI ethics/bias/fairness
* Only discusses near-term ML safety issues (robustness, adversarial examples) without connection to AGI/TAI risks
* Repeats surface-level talking points without deeper comprehension
* Misuses technical terms or makes conceptual errors

**Scoring Guide (1-5):**

* **1 — No Evidence of AI Safety Understanding:**
  * "AI safety engagement" discusses making models more accurate and less biased
  * Lists an AI ethics course focused on algorithmic fairness as safety background
  * Main stated safety concerns are job loss or privacy violations
  * Empty or irrelevant response to the engagement question

* **2 — Minimal Exposure, Understanding Unclear:**
  * Has watched introductory videos or read alignment forum posts but provides no specifics
  * Completed a two-hour introductory course, mentions worries about "transformative AI"
  * Recently discovered AI safety, follows newsletters, but no related projects or deeper engagement
  * States concern about AGI alignment while career interests remain generic ML

* **3 — Clear Engagement, Likely Foundational Understanding:**
  * Completed an 8-week AISF course, participates in a reading group, produced a course project
  * Career interests name a specific technical direction (e.g., interpretability of model deception)
  * Policy applicant writes concretely about verification regimes for frontier models
  * Multi-year casual engagement now turning into a deliberate career pivot

* **4 — Strong Evidence of Technical Understanding:**
  * Research experience with a known safety group or researcher
  * Completed ARENA with a public write-up reproducing a safety result
  * Contributions to open-source safety tooling or reproductions of safety papers
  * Published technical blog posts implementing alignment techniques

* **5 — Advanced Engagement:**
  * MATS or equivalent graduate with cited safety research
  * Currently employed in a technical safety role
  * Publications on safety or governance in recognized venues
  * Clear progression through the field's training pipeline into research output

**Important Evaluation Notes:**
- You're inferring from limited information — be conservative when uncertain.
- Weight verifiable CV items more than self-descriptions.
- Distinguish between "took an ML course that mentioned safety" and "took a course specifically on AI safety".
- If they link to work (code, blog, papers), that can provide much stronger signal.

Focus on observable proxies: what they've done, what they've produced, and whether they make obvious errors in the limited text they provide.

Before giving your score, explain your reasoning step by step.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn path_to_impact_axis() -> AxisTemplate {
    AxisTemplate {
        name: "Path to Impact".to_owned(),
        description: "Likelihood of making meaningful contributions to technical AI safety"
            .to_owned(),
        ranking_keyword: "PATH_TO_IMPACT_RATING".to_owned(),
        prompt_section: r#"## Path to Impact
This criterion assesses the likelihood that the candidate will make a significant, long-term contribution to AI safety, based on their demonstrated commitment, concrete actions taken, and career trajectory. Focus on commitment to technical AI safety, AI security, or AI policy related to catastrophic risks — not general AI ethics or ML work.

**Scoring Guide (1-5):**

* **1 — No Path Toward AI Safety:**
  * Explicitly states no intention to work on AI safety professionally
  * Using the program for general career advancement
  * Plans to stay in an unrelated field
  * Only interested as a side topic or hobby

* **2 — Exploratory Interest:**
  * "AI safety is one option I'm considering among others"
  * Curious about the field but no concrete steps taken
  * Career plan mentions "maybe transitioning eventually"
  * No specific organizations or roles identified

* **3 — Clear Commitment:**
  * "AI safety is my primary career focus going forward"
  * Names specific organizations or programs as next steps
  * Months of self-study (courses, papers, projects)
  * Active in the AI safety community
  * Has a realistic timeline for next steps

* **4 — Active Transition:**
  * Already applied to AI safety organizations or programs
  * Previous safety-program participant continuing the path
  * Left a previous career to focus on the transition
  * Graduate student with published AI safety research
  * Sustained engagement with concrete outputs

* **5 — Already Contributing:**
  * Currently in an AI safety role (even junior)
  * Working on x-risk policy at a government body or think tank
  * PhD with a safety-focused advisor and clear post-grad plans
  * Completed a selective program with an upcoming safety position
  * Senior role enabling safety work (grantmaking, program management)

**Note:** Focus on commitment and actions, not talent (covered in other axes). Career pivots take time — credit meaningful progress.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

fn research_experience_axis() -> AxisTemplate {
    AxisTemplate {
        name: "Research Experience".to_owned(),
        description: "Experience with academic or applied research".to_owned(),
        ranking_keyword: "RESEARCH_EXPERIENCE_RATING".to_owned(),
        prompt_section: r#"## Research Experience
This axis assesses the candidate's general experience with academic or applied research. Count peer-reviewed papers, substantial technical blog posts, open-source research contributions, and independent investigations (e.g., at a university or through competitions).

**What to look for:**

* Authorship or co-authorship of research papers (academic conferences/journals)

* Technical blogging, whitepapers, or major open-source research contributions

* Independent or university research projects (with tangible outputs)

* Participation in research competitions

* Evidence of investigative/analytical thinking and research taste

**Scoring Guide (1-5):**

* **1 — No Research Experience:**
    No evidence of research, academic writing, or technical investigation.

* **2 — Limited Research Exposure:**
    Participated in a university research project or contributed to an open-source research repo, but without significant outputs or authorship.

* **3 — Developed Research Experience:**
    Has written or co-authored technical blog posts, whitepapers, or non-peer-reviewed reports; may have significant contributions to group projects or smaller research publications.

* **4 — Substantial Research Track Record:**
    Authored or co-authored peer-reviewed research papers, contributed to major open-source research projects, or led substantial research efforts at a university.

* **5 — High-Impact Researcher:**
    Lead author on multiple peer-reviewed papers at top venues, or major recognized open-source research contributions; strong evidence of independent or innovative research ability.

Focus on the quality, quantity, and impact of research outputs.
Before giving your score, explain your reasoning step by step.

Provide your analysis and then state '{ranking_keyword} = ' followed by an integer from 1-5."#
            .to_owned(),
    }
}

/// Build the SPAR multi-axis template.
pub fn spar_template() -> MultiAxisTemplate {
    MultiAxisTemplate {
        id: "multi_axis_spar".to_owned(),
        name: "SPAR Research Program Evaluation".to_owned(),
        description: "Evaluation for candidates applying to the SPAR research program".to_owned(),
        system_intro: r#"Evaluate the application above, based on the following criteria: {criteria_string}

You will evaluate the applicant across multiple dimensions, providing a separate rating for each.
You should ignore general statements or facts about the world, and focus on what the applicant themselves has achieved.

IMPORTANT RATING CONSTRAINTS:
- Your rating for EACH AXIS MUST be an integer (whole number only)
- Your rating for EACH AXIS MUST be between 1 and 5 (inclusive)
- DO NOT use ratings above 5 or below 1
- If the rubric mentions different scale values, convert them to the 1-5 scale

First explain your reasoning thinking step by step. Then provide a separate rating for each axis:"#
            .to_owned(),
        system_outro: "After evaluating all axes, provide an overall summary of the candidate's strengths and weaknesses.{additional_instructions}".to_owned(),
        axes: vec![
            general_promise_axis(),
            ml_skills_axis(),
            software_engineering_axis(),
            policy_experience_axis(),
            ai_safety_understanding_axis(),
            path_to_impact_axis(),
            research_experience_axis(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spar_template_invariants() {
        let template = spar_template();
        template.validate().expect("template should be valid");
        assert_eq!(template.id, "multi_axis_spar");
        assert_eq!(template.axes.len(), 7);
    }

    #[test]
    fn test_axis_order_and_keywords() {
        let template = spar_template();
        let keywords: Vec<&str> = template
            .axes
            .iter()
            .map(|axis| axis.ranking_keyword.as_str())
            .collect();
        assert_eq!(
            keywords,
            vec![
                "GENERAL_PROMISE_RATING",
                "ML_SKILLS_RATING",
                "SOFTWARE_ENGINEERING_RATING",
                "POLICY_EXPERIENCE_RATING",
                "AI_SAFETY_UNDERSTANDING_RATING",
                "PATH_TO_IMPACT_RATING",
                "RESEARCH_EXPERIENCE_RATING",
            ]
        );
        assert!(keywords.iter().all(|k| k.ends_with("_RATING")));
    }

    #[test]
    fn test_every_section_carries_the_keyword_placeholder() {
        let template = spar_template();
        for axis in &template.axes {
            assert!(
                axis.prompt_section.contains("{ranking_keyword}"),
                "axis {} missing placeholder",
                axis.name
            );
        }
    }

    #[test]
    fn test_last_axis_is_research_experience() {
        let template = spar_template();
        assert_eq!(
            template.axes.last().map(|a| a.name.as_str()),
            Some("Research Experience")
        );
    }
}
