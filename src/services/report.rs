//! 报告生成 - 业务能力层
//!
//! 学生报告写入学生目录，教师报告写入输出目录。
//! 图表一律渲染为 Markdown 表格。

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::StudentRepository;
use crate::models::QuestionOutcome;
use crate::services::advisor::Advisor;
use crate::services::class_stats::{self, StudentSnapshot};

const TEACHER_REPORT_FILE: &str = "teacher_report.md";
const ADVICE_FAILED: &str = "生成失败。";

/// 报告中的固定信息
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub grade: String,
    pub class_id: String,
    pub paper_id: String,
    pub exam_number: u32,
    pub date: String,
}

impl ReportContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            grade: config.grade.clone(),
            class_id: config.class_id.clone(),
            paper_id: config.paper_id.clone(),
            exam_number: config.exam_number,
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// 名次变化描述：两次及以上考试与上次比较，五次及以上再与第一次比较
pub fn rank_progress(history: &[(u32, f64, u32)]) -> Option<String> {
    let ranks: Vec<u32> = history.iter().map(|(_, _, rank)| *rank).collect();
    if ranks.len() < 2 {
        return None;
    }
    let current = ranks[ranks.len() - 1];
    let previous = ranks[ranks.len() - 2];
    let mut text = format!("与上次相比，{}", describe_move(previous, current));
    if ranks.len() >= 5 {
        let _ = write!(text, "，与第一次考试相比{}", describe_move(ranks[0], current));
    }
    Some(text)
}

fn describe_move(from: u32, to: u32) -> String {
    let delta = from as i64 - to as i64;
    match delta {
        d if d > 0 => format!("排名↑{}名（从第{}名到第{}名）", d, from, to),
        d if d < 0 => format!("排名↓{}名（从第{}名到第{}名）", -d, from, to),
        _ => format!("排名持平（第{}名）", to),
    }
}

/// 学生报告正文
pub fn render_student_report(
    ctx: &ReportContext,
    student: &StudentSnapshot,
    advice: Option<&str>,
) -> String {
    let info = &student.info;
    let mut md = String::new();
    let _ = writeln!(md, "# 📄 学生考试报告：{}\n", info.name);
    let _ = writeln!(md, "## 基本信息\n");
    let _ = writeln!(md, "- 学号：{}", info.student_id);
    let _ = writeln!(md, "- 班级：{} {}", ctx.grade, ctx.class_id);
    if !info.gender.is_empty() {
        let _ = writeln!(md, "- 性别：{}", info.gender);
    }
    let _ = writeln!(md, "- 考试编号：{}", ctx.paper_id);
    let _ = writeln!(
        md,
        "- 当前总分：{}，当前排名：第{}名",
        student.score, student.rank
    );
    let history = student.history_until(ctx.exam_number);
    if let Some(progress) = rank_progress(&history) {
        let _ = writeln!(md, "- {}", progress);
    }

    let _ = writeln!(md, "\n## 错误题目与知识点\n");
    let wrong = student.revise.wrong_items();
    if wrong.is_empty() {
        let _ = writeln!(md, "✅ 本次考试全部答对，真棒！");
    } else {
        for (question_id, focus) in wrong {
            let _ = writeln!(md, "- 题目 {}：{}", question_id, focus);
        }
    }

    let failed: Vec<_> = student
        .revise
        .ordered()
        .into_iter()
        .filter_map(|(id, outcome)| match outcome {
            QuestionOutcome::Failed(failure) => Some((id, failure)),
            QuestionOutcome::Graded(_) => None,
        })
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(md, "\n## 待人工复核的题目\n");
        for (question_id, failure) in failed {
            let _ = writeln!(md, "- 题目 {}：{}", question_id, failure.grading_error);
        }
    }

    let _ = writeln!(md, "\n## 历史分数与排名变化\n");
    let _ = writeln!(md, "| 考试 | 总分 | 排名 |");
    let _ = writeln!(md, "|---|---|---|");
    for (n, score, rank) in &history {
        let _ = writeln!(md, "| Exam {} | {} | {} |", n, score, rank);
    }

    if let Some(advice) = advice {
        let _ = writeln!(md, "\n## 💬 学习建议（由 AI 生成）\n");
        let _ = writeln!(md, "{}", advice.trim());
    }
    md
}

/// 学生建议的提示词
pub fn student_advice_prompt(ctx: &ReportContext, student: &StudentSnapshot) -> String {
    let history = student.history_until(ctx.exam_number);
    let past: Vec<_> = history.iter().filter(|(n, _, _)| *n < ctx.exam_number).collect();
    let past_scores: Vec<String> = past.iter().map(|(_, s, _)| s.to_string()).collect();
    let past_ranks: Vec<String> = past.iter().map(|(_, _, r)| r.to_string()).collect();

    let historical = student.ledger.all_wrong_focus();
    let historical = if historical.is_empty() {
        "无".to_string()
    } else {
        historical.join("，")
    };
    let current: Vec<String> = student
        .revise
        .wrong_items()
        .into_iter()
        .map(|(id, focus)| format!("{}-{}", id, focus))
        .collect();
    let current = if current.is_empty() {
        "无".to_string()
    } else {
        current.join("，")
    };

    format!(
        "你是一个中学生学业辅导专家，请根据以下信息，为该学生撰写一段不超过150字的考试反馈建议，\
         指出其进步与不足，并给予鼓励和改进建议。\n\n\
         学生姓名：{}\n过往分数：[{}]\n当前分数：{}\n过往排名：[{}]\n当前排名：{}\n\
         历史错误知识点：{}\n本次错误题目与知识点：{}\n请输出简洁凝练的反馈建议：",
        student.info.name,
        past_scores.join(", "),
        student.score,
        past_ranks.join(", "),
        student.rank,
        historical,
        current
    )
}

/// 教师报告正文；`advice` 为 None 时不输出建议小节
pub fn render_teacher_report(
    ctx: &ReportContext,
    students: &[StudentSnapshot],
    advice: Option<&str>,
) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# 📘 教师报告汇总（{}）\n", ctx.date);
    let _ = writeln!(md, "## 年级班级信息\n");
    let _ = writeln!(md, "- 年级：{}  班级：{}", ctx.grade, ctx.class_id);
    let _ = writeln!(
        md,
        "- 考试编号：{}  考试次数：Exam {}",
        ctx.paper_id, ctx.exam_number
    );

    let scores: Vec<f64> = students.iter().map(|s| s.score).collect();
    let _ = writeln!(md, "\n## 一、学生分数分布\n");
    let _ = writeln!(md, "| 分数段 | 人数 |");
    let _ = writeln!(md, "|---|---|");
    for bin in class_stats::score_distribution(&scores) {
        let _ = writeln!(md, "| {}-{} | {} |", bin.lower, bin.upper, bin.count);
    }

    let _ = writeln!(md, "\n## 二、分数统计变化趋势\n");
    let _ = writeln!(md, "| 考试 | 人数 | 平均分 | 最高分 | 最低分 | 中位数 |");
    let _ = writeln!(md, "|---|---|---|---|---|---|");
    for stats in class_stats::exam_trend(students) {
        let _ = writeln!(
            md,
            "| Exam {} | {} | {:.1} | {} | {} | {} |",
            stats.exam_number, stats.count, stats.mean, stats.max, stats.min, stats.median
        );
    }

    let questions = class_stats::question_accuracy(students);
    let worst_questions = class_stats::lowest(&questions, 5);
    let _ = writeln!(md, "\n## 三、每道题的正确率\n");
    let _ = writeln!(md, "正确率最低的五题已用 ⚠️ 标出：\n");
    let _ = writeln!(md, "| 题号 | 满分人数 | 作答人数 | 正确率 |");
    let _ = writeln!(md, "|---|---|---|---|");
    for row in &questions {
        let flag = if worst_questions.iter().any(|w| w.key == row.key) {
            " ⚠️"
        } else {
            ""
        };
        let _ = writeln!(
            md,
            "| {}{} | {} | {} | {:.1}% |",
            row.key,
            flag,
            row.full_credit,
            row.total,
            row.rate() * 100.0
        );
    }

    let focus = class_stats::focus_accuracy(students);
    let _ = writeln!(md, "\n## 四、每个知识点的正确率\n");
    let _ = writeln!(md, "| 知识点 | 满分次数 | 作答次数 | 正确率 |");
    let _ = writeln!(md, "|---|---|---|---|");
    for row in &focus {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {:.1}% |",
            row.key,
            row.full_credit,
            row.total,
            row.rate() * 100.0
        );
    }

    let changes = class_stats::rank_changes(students);
    let progress = class_stats::top_progress(&changes, 5);
    let decline = class_stats::top_decline(&changes, 5);
    let top: Vec<&str> = class_stats::top_students(students, 5)
        .into_iter()
        .map(|s| s.info.name.as_str())
        .collect();

    let _ = writeln!(md, "\n## 五、考试表现总结\n");
    let _ = writeln!(md, "### 🏆 最近一次考试前五名：\n");
    let _ = writeln!(md, "{}", if top.is_empty() { "无".to_string() } else { top.join("，") });
    let _ = writeln!(md, "\n### 📈 进步前五名：\n");
    if progress.is_empty() {
        let _ = writeln!(md, "无");
    }
    for (i, change) in progress.iter().enumerate() {
        let _ = writeln!(
            md,
            "- {}. {}：↑{}名（{} → {}）",
            i + 1,
            change.name,
            change.diff,
            change.first_rank,
            change.latest_rank
        );
    }
    let _ = writeln!(md, "\n### 📉 退步前五名：\n");
    if decline.is_empty() {
        let _ = writeln!(md, "无");
    }
    for (i, change) in decline.iter().enumerate() {
        let _ = writeln!(
            md,
            "- {}. {}：↓{}名（{} → {}）",
            i + 1,
            change.name,
            -change.diff,
            change.first_rank,
            change.latest_rank
        );
    }

    let (exams, rows) = class_stats::average_ranks(students);
    let _ = writeln!(md, "\n## 六、历次考试平均排名表\n");
    let header: Vec<String> = exams.iter().map(|n| format!("Exam {}", n)).collect();
    let _ = writeln!(md, "| 姓名 | {} | 平均排名 |", header.join(" | "));
    let _ = writeln!(md, "|---|{}---|", "---|".repeat(exams.len()));
    for row in rows {
        let ranks: Vec<String> = row
            .ranks
            .iter()
            .map(|r| r.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()))
            .collect();
        let average = row
            .average
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(md, "| {} | {} | {} |", row.name, ranks.join(" | "), average);
    }

    if let Some(advice) = advice {
        let _ = writeln!(md, "\n## 七、💡 AI 教学建议\n");
        let _ = writeln!(md, "{}", advice.trim());
    }
    md
}

/// 教学建议的提示词
pub fn teacher_advice_prompt(students: &[StudentSnapshot]) -> String {
    let questions = class_stats::question_accuracy(students);
    let worst_questions: Vec<String> = class_stats::lowest(&questions, 5)
        .into_iter()
        .map(|row| format!("第{}题（{:.1}%）", row.key, row.rate() * 100.0))
        .collect();
    let focus = class_stats::focus_accuracy(students);
    let worst_focus: Vec<String> = class_stats::lowest(&focus, 5)
        .into_iter()
        .map(|row| format!("{}（{:.1}%）", row.key, row.rate() * 100.0))
        .collect();
    let changes = class_stats::rank_changes(students);
    let progress: Vec<String> = class_stats::top_progress(&changes, 5)
        .into_iter()
        .map(|c| format!("{}（+{}名）", c.name, c.diff))
        .collect();
    let decline: Vec<String> = class_stats::top_decline(&changes, 5)
        .into_iter()
        .map(|c| format!("{}（{}名）", c.name, c.diff))
        .collect();

    format!(
        "你是一位中学教师，请根据以下数据撰写教学建议：\n\n\
         - 正确率最低的题目：{}\n\
         - 正确率最低的知识点：{}\n\
         - 进步前五：{}\n\
         - 退步前五：{}\n\n\
         请：\n1. 指出重点讲解的题目/知识点；\n2. 针对学生表现提出建议；\n\
         3. 给进步学生鼓励；\n4. 给退步学生提供关注建议。",
        worst_questions.join("，"),
        worst_focus.join("，"),
        progress.join("，"),
        decline.join("，")
    )
}

/// 报告生成器
pub struct ReportGenerator {
    context: ReportContext,
    repo: StudentRepository,
    output_root: PathBuf,
    advisor: Option<Arc<dyn Advisor>>,
}

impl ReportGenerator {
    pub fn new(
        context: ReportContext,
        repo: StudentRepository,
        output_root: impl Into<PathBuf>,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Self {
        Self {
            context,
            repo,
            output_root: output_root.into(),
            advisor,
        }
    }

    /// 读取学生本次考试后的数据；历史记录中必须已有本次考试
    pub async fn load_snapshot(&self, student_id: &str, exam_id: &str) -> AppResult<StudentSnapshot> {
        let info = self.repo.load_info(student_id).await?;
        let revise = self.repo.load_answer_revise(student_id).await?;
        let ledger = self.repo.load_ledger(student_id).await?;
        let (score, rank) = ledger
            .get(exam_id)
            .map(|entry| (entry.score, entry.rank))
            .ok_or_else(|| {
                AppError::Other(format!("学生 {} 的历史记录中没有考试 {}", student_id, exam_id))
            })?;
        Ok(StudentSnapshot {
            student_id: student_id.to_string(),
            info,
            revise,
            ledger,
            score,
            rank,
        })
    }

    /// 生成并写入学生报告；建议生成失败时省略建议小节
    pub async fn student_report(&self, student: &StudentSnapshot) -> AppResult<PathBuf> {
        let advice = match &self.advisor {
            Some(advisor) => {
                let prompt = student_advice_prompt(&self.context, student);
                match advisor.advise(&prompt).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("⚠️ [学生 {}] AI 生成建议失败: {}", student.student_id, e);
                        None
                    }
                }
            }
            None => None,
        };

        let markdown = render_student_report(&self.context, student, advice.as_deref());
        let path = self.repo.write_report(&student.student_id, &markdown).await?;
        info!("✅ [学生 {}] 已生成报告: {}", student.student_id, path.display());
        Ok(path)
    }

    /// 生成并写入教师报告；建议生成失败时写"生成失败。"
    pub async fn teacher_report(&self, students: &[StudentSnapshot]) -> AppResult<PathBuf> {
        let advice = match &self.advisor {
            Some(advisor) => match advisor.advise(&teacher_advice_prompt(students)).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("⚠️ 教学建议生成失败: {}", e);
                    Some(ADVICE_FAILED.to_string())
                }
            },
            None => None,
        };

        let markdown = render_teacher_report(&self.context, students, advice.as_deref());
        fs::create_dir_all(&self.output_root)
            .await
            .map_err(|e| AppError::file_write_failed(self.output_root.display().to_string(), e))?;
        let path = self.output_root.join(TEACHER_REPORT_FILE);
        fs::write(&path, markdown)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        info!("✅ 教师报告生成成功: {}", path.display());
        Ok(path)
    }
}
