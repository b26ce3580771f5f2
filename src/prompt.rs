//! Prompt text for the composer.
//!
//! The outline below is what the rest of the crate parses: the title line
//! feeds [`crate::keywords`], and the 今日头条 label and 🔥/⚠️/💀 radar markers
//! feed [`crate::history`] on later runs.

use crate::models::SourceSnapshot;
use std::fmt::Write;

pub const MARKDOWN_TAG: &str = "MARKDOWN";
pub const HTML_TAG: &str = "WECHAT_HTML";

/// Column name and author persona.
pub const COLUMN_NAME: &str = "Tech老兵日记";

const PERSONA: &str = "你是一位在硅谷工作多年的华人技术老兵，同时运营一个小众但有深度的技术公众号「Tech老兵日记」。你的风格是：
- 说话直接，偶尔毒舌，但观点犀利
- 喜欢用类比和比喻解释复杂概念
- 敢于表态，会明确说出\"这个我不看好\"或\"这个值得关注\"
- 偶尔吐槽行业乱象和过度炒作
- 语气像跟朋友聊天，不是写报告
- 会分享一些圈内人才知道的洞察";

const OUTLINE: &str = "1. **开篇引言**：2-3 句引人入胜的话，抛出观点或制造悬念。

2. **## 今日头条：XXX**（标题必须是这一格式，XXX 为事件名）：针对今天最重要的 1 个事件深度分析 300-400 字
   - 这是什么：用大白话解释
   - 为什么重要：对行业和开发者的影响
   - 我的看法：个人判断和预测
   - 你应该关注的点：具体建议

3. **## 硅谷雷达：本周值得关注**：2-3 个重要趋势，每个 150-200 字
   - 每个趋势单独一行小标题，以 🔥（强烈看好）、⚠️（需要观望）或 💀（不看好）开头
   - 每个都要有\"这意味着什么\"的分析

4. **## HN 热榜精选**：8-10 个项目
   | 排名 | 标题 | 热度 | 为什么值得看 |
   - 表格后挑 2-3 个特别有意思的补充深度点评

5. **## Product Hunt 今日发现**：5-6 个产品
   | 产品 | 一句话介绍 | 亮点 | 踩坑提醒 |
   - 对特别有意思的产品，补充它解决了什么痛点

6. **## GitHub Trending**：5-8 个仓库
   | 仓库 | 语言 | Star 增长 | 一句话点评 |

7. **## AI 圈内幕**：400-500 字
   - 大厂动态：谁发布了什么，意味着什么
   - 开源社区：有什么新项目值得关注
   - 工具推荐：我最近在用什么，体验如何
   - 行业八卦：有意思的事情（如果有的话）

8. **## 社区热议**：Reddit 等论坛上 2-3 个讨论最激烈的话题，各方观点 + 我的立场

9. **## 本周实操建议**：2-3 个具体可落地的行动项，要具体到\"打开 xxx，试试 xxx 功能\"

10. **## 老兵碎碎念**：150-200 字的个人感悟，真诚，像跟老朋友聊天

11. **## 互动时间 & 下期预告**
   - 抛出 1-2 个问题引导读者在评论区讨论
   - 加一句\"觉得有用的话，点个赞/在看支持一下👇\"
   - 1-2 句话预告下期话题，并引导关注公众号";

const STYLE_GUIDE: &str = "**布局规范（重要！）：**
- 卡片容器：padding: 15px; margin-bottom: 15px;（不要用过大的内边距）
- 标题和内容之间：margin-bottom: 10px;
- 表格：margin-top: 10px; width: 100%;
- 禁止使用 min-height 或固定 height
- 禁止在标题和表格之间添加空的 div 或 br 标签

**样式规范：**
- 全部使用内联样式，颜色一律写十六进制色值（如 #ffffff），不要写 white、red 等颜色名
- 卡片背景：浅色渐变 linear-gradient(135deg, #f5f7fa 0%, #c3cfe2 100%) 或类似柔和色
- 卡片圆角：border-radius: 12px;
- 表格：每个 <th> 单元格都要单独写 background-color: #667eea; color: #ffffff;（不要只给 <tr> 设背景），数据行交替背景色
- 表格单元格：padding: 8px 10px;
- 字体大小：标题 16-18px，正文 14-15px，表格 13px
- 行间距：line-height: 1.8;

**特殊区块样式：**
- 今日头条区块：渐变背景 linear-gradient(135deg, #667eea 0%, #764ba2 100%)，白色文字
- 互动引导区块：橙色/红色系渐变背景，加粗文字，居中对齐
- 碎碎念/个人观点：左边框 4px solid #667eea，浅灰背景 #f8f9fa
- 关键词/标签：小圆角背景色块

**互动引导样式示例：**
```html
<div style=\"background: linear-gradient(135deg, #ff6b6b 0%, #feca57 100%); padding: 20px; border-radius: 12px; text-align: center; margin: 20px 0;\">
  <p style=\"color: #ffffff; font-size: 16px; font-weight: bold; margin: 0;\">👇 觉得有用？点个「在看」支持一下</p>
</div>
```";

/// Inputs shared by every prompt of one run.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// `2026年01月16日`
    pub date_long: &'a str,
    /// `2026-01-16`
    pub date_short: &'a str,
    pub sources: &'a [SourceSnapshot],
    /// Rendered history block; empty when there is none.
    pub history: &'a str,
}

fn write_sources(out: &mut String, sources: &[SourceSnapshot]) {
    out.push_str("## 数据源\n\n");
    for source in sources {
        writeln!(out, "### {}\n{}\n", source.name, source.raw_text.trim()).ok();
    }
}

fn write_markdown_requirements(out: &mut String, ctx: &PromptContext<'_>) {
    writeln!(
        out,
        "## 输出要求

### 长度与 SEO
- 文章总长度 1500-2500 字，内容要充实有料
- 标题包含热门关键词（AI、Claude、GPT、效率工具、程序员等）
- 正文自然融入长尾关键词（AI工具推荐、程序员效率、科技趋势、硅谷见闻等）
- 文中和文末设置互动钩子，引导点赞、在看、评论，并自然提及关注公众号的好处

### Markdown 结构
第一行必须是标题，格式严格为：
`# {COLUMN_NAME} | {date}：关键词1、关键词2、关键词3`
其中每个关键词不超过 15 个字，用顿号分隔，概括今天最重要的 2-3 件事。

然后按以下 11 个部分展开：

{OUTLINE}
",
        date = ctx.date_short
    )
    .ok();
}

fn header(out: &mut String, ctx: &PromptContext<'_>) {
    writeln!(out, "{PERSONA}\n\n今天是 {}。请根据以下数据源，用你的风格写一份技术日报。\n", ctx.date_long).ok();
    write_sources(out, ctx.sources);
    if !ctx.history.trim().is_empty() {
        writeln!(out, "{}", ctx.history.trim_end()).ok();
        out.push_str("今日头条必须选择与上面不同的事件；雷达趋势如与近期重复，要给出新的进展或角度。\n\n");
    }
}

/// Stage one of the two-stage mode: markdown only.
pub fn markdown_prompt(ctx: &PromptContext<'_>) -> String {
    let mut out = String::new();
    header(&mut out, ctx);
    write_markdown_requirements(&mut out, ctx);
    writeln!(
        out,
        "请严格按以下格式返回（注意使用方括号标签）：\n\n[{MARKDOWN_TAG}]\n（Markdown 内容）\n[/{MARKDOWN_TAG}]"
    )
    .ok();
    out
}

/// Stage two: convert the finished markdown into WeChat HTML.
pub fn html_prompt(markdown: &str) -> String {
    format!(
        "下面是一篇已经写好的公众号技术日报（Markdown）。请把它完整转换为适配微信公众号的富文本 HTML，\
不要删减或改写内容，严格遵循以下样式规范：

{STYLE_GUIDE}

请严格按以下格式返回（HTML 以 <div> 开始，不要包含 <!DOCTYPE>、<html>、<head>、<body> 等标签）：

[{HTML_TAG}]
（HTML 内容）
[/{HTML_TAG}]

## 原文

{markdown}
"
    )
}

/// Single-stage mode: markdown and HTML in one answer.
pub fn combined_prompt(ctx: &PromptContext<'_>) -> String {
    let mut out = String::new();
    header(&mut out, ctx);
    write_markdown_requirements(&mut out, ctx);
    writeln!(
        out,
        "### HTML 版本
同时生成适配微信公众号的富文本 HTML，内容与 Markdown 一致，严格遵循以下样式规范：

{STYLE_GUIDE}

请严格按以下格式返回（注意使用方括号标签）：

[{MARKDOWN_TAG}]
（Markdown 内容）
[/{MARKDOWN_TAG}]

[{HTML_TAG}]
（HTML 内容，以 <div> 开始，不要包含 <!DOCTYPE>、<html>、<head>、<body> 等标签）
[/{HTML_TAG}]"
    )
    .ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceSnapshot> {
        vec![
            SourceSnapshot {
                name: "Hacker News".into(),
                raw_text: "1. Rust 2026 edition".into(),
            },
            SourceSnapshot {
                name: "Product Hunt".into(),
                raw_text: "（未获取到Product Hunt数据）".into(),
            },
        ]
    }

    #[test]
    fn markdown_prompt_embeds_sources_and_title_format() {
        let sources = sources();
        let ctx = PromptContext {
            date_long: "2026年01月16日",
            date_short: "2026-01-16",
            sources: &sources,
            history: "",
        };
        let prompt = markdown_prompt(&ctx);
        assert!(prompt.contains("### Hacker News\n1. Rust 2026 edition"));
        assert!(prompt.contains("# Tech老兵日记 | 2026-01-16：关键词1、关键词2、关键词3"));
        assert!(prompt.contains("## 今日头条：XXX"));
        assert!(prompt.contains("11. **## 互动时间"));
        assert!(prompt.contains("[MARKDOWN]"));
        assert!(!prompt.contains("[WECHAT_HTML]"));
        assert!(!prompt.contains("近期已报道"));
    }

    #[test]
    fn history_block_is_included_when_present() {
        let sources = sources();
        let ctx = PromptContext {
            date_long: "2026年01月16日",
            date_short: "2026-01-16",
            sources: &sources,
            history: "## 近期已报道\n- 2026-01-15：头条：旧闻\n",
        };
        let prompt = combined_prompt(&ctx);
        assert!(prompt.contains("- 2026-01-15：头条：旧闻"));
        assert!(prompt.contains("[WECHAT_HTML]"));
    }

    #[test]
    fn html_prompt_carries_markdown() {
        let prompt = html_prompt("# 标题\n正文");
        assert!(prompt.ends_with("# 标题\n正文\n"));
        assert!(prompt.contains("background-color: #667eea"));
    }
}
