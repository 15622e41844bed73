//! One-pass in-page extraction.
//!
//! A single injected script walks every `input|textarea|select|button`,
//! whether or not it sits inside a `<form>`, and returns a JSON payload
//! the snapshot model deserializes directly. The walk is read-only.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::PerceiverError;
use crate::model::{ElementSnapshot, PageContext};

/// Extraction payload as emitted by [`EXTRACT_SCRIPT`].
#[derive(Debug, Deserialize)]
pub(crate) struct Extraction {
    pub context: PageContext,
    pub elements: Vec<ElementSnapshot>,
}

pub(crate) fn decode_extraction(value: Value) -> Result<Extraction, PerceiverError> {
    if value.is_null() {
        return Err(PerceiverError::Evaluation(
            "extraction script returned no value".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| PerceiverError::Malformed(err.to_string()))
}

/// The in-page walk. The `__formpilot_extract__` marker keys stub drivers.
pub const EXTRACT_SCRIPT: &str = r#"(() => { /* __formpilot_extract__ */
    const LABEL_RADIUS = 160;
    const EXCERPT_CAP = 8000;

    const esc = (s) => (window.CSS && CSS.escape)
        ? CSS.escape(s)
        : String(s).replace(/([^a-zA-Z0-9_-])/g, '\\$1');

    const styleHides = (st) =>
        st.display === 'none' ||
        st.visibility === 'hidden' ||
        parseFloat(st.opacity || '1') <= 0.01;

    const ancestorHidden = (el) => {
        let node = el.parentElement;
        while (node && node !== document.documentElement) {
            if (styleHides(window.getComputedStyle(node))) { return true; }
            node = node.parentElement;
        }
        return false;
    };

    const stableSelector = (el) => {
        if (el.id) { return '#' + esc(el.id); }
        const tag = el.tagName.toLowerCase();
        const name = el.getAttribute('name');
        if (name) {
            const byName = tag + '[name="' + esc(name) + '"]';
            try {
                if (document.querySelectorAll(byName).length === 1) { return byName; }
            } catch (e) { /* fall through to the path */ }
        }
        const path = [];
        let node = el;
        while (node && node.nodeType === 1 && node !== document.body) {
            let step = node.tagName.toLowerCase();
            const parent = node.parentElement;
            if (parent) {
                const peers = Array.from(parent.children)
                    .filter((c) => c.tagName === node.tagName);
                if (peers.length > 1) {
                    step += ':nth-of-type(' + (peers.indexOf(node) + 1) + ')';
                }
            }
            path.unshift(step);
            node = node.parentElement;
        }
        return path.join(' > ');
    };

    const nearestPrecedingText = (el) => {
        const rect = el.getBoundingClientRect();
        let node = el.previousElementSibling || el.parentElement;
        let hops = 0;
        while (node && hops < 6) {
            const text = (node.innerText || '').trim();
            if (text && text.length <= 120) {
                const r = node.getBoundingClientRect();
                const dx = Math.abs(r.left - rect.left);
                const dy = Math.abs(r.top - rect.top);
                if (dx <= LABEL_RADIUS && dy <= LABEL_RADIUS) { return text; }
            }
            node = node.previousElementSibling || node.parentElement;
            hops += 1;
        }
        return null;
    };

    const labelsFor = (el) => {
        const labels = [];
        if (el.id) {
            const forLabel = document.querySelector('label[for="' + esc(el.id) + '"]');
            if (forLabel && forLabel.innerText.trim()) {
                labels.push(forLabel.innerText.trim());
            }
        }
        const wrapping = el.closest('label');
        if (wrapping && wrapping.innerText.trim()) {
            labels.push(wrapping.innerText.trim());
        }
        const aria = el.getAttribute('aria-label');
        if (aria && aria.trim()) { labels.push(aria.trim()); }
        if (labels.length === 0) {
            const preceding = nearestPrecedingText(el);
            if (preceding) { labels.push(preceding); }
        }
        return labels;
    };

    const describe = (el) => {
        const st = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const tag = el.tagName.toLowerCase();
        const tabindexAttr = el.getAttribute('tabindex');
        const form = el.closest('form');
        return {
            tag: tag,
            inputType: tag === 'input' ? (el.getAttribute('type') || 'text') : null,
            id: el.id || null,
            name: el.getAttribute('name'),
            classNames: Array.from(el.classList),
            placeholder: el.getAttribute('placeholder'),
            currentValue: typeof el.value === 'string' ? el.value : '',
            required: !!el.required || el.getAttribute('aria-required') === 'true',
            disabled: !!el.disabled,
            visibility: {
                display: st.display,
                visibility: st.visibility,
                opacity: parseFloat(st.opacity || '1'),
                position: st.position,
                offsetLeft: parseFloat(st.left) || rect.left,
                offsetTop: parseFloat(st.top) || rect.top,
                width: rect.width,
                height: rect.height,
                zIndex: st.zIndex,
                clip: (st.clipPath && st.clipPath !== 'none') ? st.clipPath
                    : (st.clip && st.clip !== 'auto') ? st.clip : null,
                transform: (st.transform && st.transform !== 'none') ? st.transform : null
            },
            boundingBox: rect.width || rect.height
                ? { x: rect.x, y: rect.y, width: rect.width, height: rect.height }
                : null,
            nearbyLabels: labelsFor(el),
            ancestorFormId: form ? (form.id || form.getAttribute('name')) : null,
            ancestorHidden: ancestorHidden(el),
            tabindex: tabindexAttr === null ? null : parseInt(tabindexAttr, 10),
            ariaHidden: el.getAttribute('aria-hidden') === 'true' ||
                !!(el.closest && el.closest('[aria-hidden="true"]')),
            selector: stableSelector(el),
            options: tag === 'select'
                ? Array.from(el.options).slice(0, 30).map((o) => o.value || o.text)
                : []
        };
    };

    const excerptOf = () => {
        const regions = document.forms.length
            ? Array.from(document.forms)
            : (document.body ? [document.body] : []);
        const html = regions.map((r) => r.outerHTML).join('\n');
        return html
            .replace(/<script[\s\S]*?<\/script>/gi, '')
            .replace(/<style[\s\S]*?<\/style>/gi, '')
            .replace(/<!--[\s\S]*?-->/g, '')
            .slice(0, EXCERPT_CAP);
    };

    const bodyText = document.body ? document.body.innerText.toLowerCase() : '';
    const elements = Array.from(
        document.querySelectorAll('input, textarea, select, button')
    ).map(describe);

    return {
        context: {
            url: window.location.href,
            title: document.title || '',
            looksLikeSignup: /sign\s*up|register|create\s+(an\s+|your\s+)?account/.test(bodyText),
            looksLikeLogin: /log\s*in|sign\s*in/.test(bodyText),
            frameCount: window.frames.length,
            hasChallengeWidget: !!document.querySelector(
                'iframe[src*="recaptcha"], .g-recaptcha, .h-captcha, [class*="captcha"]'
            ),
            formCount: document.forms.length,
            htmlExcerpt: excerptOf()
        },
        elements: elements
    };
})()"#;
